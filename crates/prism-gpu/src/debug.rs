//! Driver debug messages routed to a caller-supplied sink.

use crate::error::{GpuError, Result};
use crate::teardown::TeardownStack;
use ash::vk;
use std::ffi::{c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Severity of a driver debug message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugSeverity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl From<vk::DebugUtilsMessageSeverityFlagsEXT> for DebugSeverity {
    fn from(flags: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            Self::Error
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            Self::Warning
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            Self::Info
        } else {
            Self::Verbose
        }
    }
}

/// Category of a driver debug message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCategory {
    General,
    Validation,
    Performance,
}

impl From<vk::DebugUtilsMessageTypeFlagsEXT> for DebugCategory {
    fn from(flags: vk::DebugUtilsMessageTypeFlagsEXT) -> Self {
        if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            Self::Validation
        } else if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            Self::Performance
        } else {
            Self::General
        }
    }
}

/// A structured driver debug message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEvent {
    pub severity: DebugSeverity,
    pub category: DebugCategory,
    pub message: String,
}

/// Receiver for driver debug messages.
///
/// The driver may call the sink from any thread.
pub trait DebugSink: Send + Sync {
    fn on_event(&self, event: &DebugEvent);
}

impl<F> DebugSink for F
where
    F: Fn(&DebugEvent) + Send + Sync,
{
    fn on_event(&self, event: &DebugEvent) {
        self(event);
    }
}

/// Default sink forwarding debug messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDebugSink;

impl DebugSink for TracingDebugSink {
    fn on_event(&self, event: &DebugEvent) {
        let category = event.category;
        match event.severity {
            DebugSeverity::Error => tracing::error!(?category, "{}", event.message),
            DebugSeverity::Warning => tracing::warn!(?category, "{}", event.message),
            DebugSeverity::Info => tracing::info!(?category, "{}", event.message),
            DebugSeverity::Verbose => tracing::trace!(?category, "{}", event.message),
        }
    }
}

/// Install a debug messenger reporting warnings and errors to `sink`.
///
/// The messenger and the boxed sink it points at are released through the
/// teardown stack, before the instance itself.
///
/// # Safety
/// The instance must be valid and created with `VK_EXT_debug_utils` enabled.
pub unsafe fn install_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    sink: Arc<dyn DebugSink>,
    teardown: &mut TeardownStack,
) -> Result<()> {
    let loader = ash::ext::debug_utils::Instance::new(entry, instance);

    let user_data = Box::into_raw(Box::new(sink));

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .user_data(user_data.cast::<c_void>());

    let messenger = match unsafe { loader.create_debug_utils_messenger(&create_info, None) } {
        Ok(messenger) => messenger,
        Err(e) => {
            // SAFETY: the pointer came from Box::into_raw above and was never shared
            drop(unsafe { Box::from_raw(user_data) });
            return Err(GpuError::InstanceCreation(format!(
                "Failed to set up debug messenger: {e}"
            )));
        }
    };

    teardown.push("debug messenger", move || {
        // SAFETY: teardown runs before the instance is destroyed
        unsafe {
            loader.destroy_debug_utils_messenger(messenger, None);
            drop(Box::from_raw(user_data));
        }
    });

    Ok(())
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    user_data: *mut c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || user_data.is_null() {
        return vk::FALSE;
    }

    // SAFETY: user_data is the boxed sink installed with the messenger, and the
    // driver hands us a valid callback data struct for the duration of the call
    let (sink, message) = unsafe {
        let sink = &*user_data.cast::<Arc<dyn DebugSink>>();
        let p_message = (*callback_data).p_message;
        let message = if p_message.is_null() {
            String::new()
        } else {
            CStr::from_ptr(p_message).to_string_lossy().into_owned()
        };
        (sink, message)
    };

    let event = DebugEvent {
        severity: severity.into(),
        category: types.into(),
        message,
    };

    // Unwinding across the driver's frames is undefined behavior
    if catch_unwind(AssertUnwindSafe(|| sink.on_event(&event))).is_err() {
        tracing::error!("Debug sink panicked while handling: {}", event.message);
    }

    // Never abort the call that triggered the message
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn severity_picks_the_most_severe_bit() {
        let flags = vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
        assert_eq!(DebugSeverity::from(flags), DebugSeverity::Error);
        assert_eq!(
            DebugSeverity::from(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE),
            DebugSeverity::Verbose
        );
        assert!(DebugSeverity::Warning > DebugSeverity::Info);
    }

    #[test]
    fn category_prefers_validation() {
        let flags = vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION;
        assert_eq!(DebugCategory::from(flags), DebugCategory::Validation);
        assert_eq!(
            DebugCategory::from(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE),
            DebugCategory::Performance
        );
        assert_eq!(
            DebugCategory::from(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL),
            DebugCategory::General
        );
    }

    #[test]
    fn callback_forwards_to_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let collected = seen.clone();
        let sink: Arc<dyn DebugSink> = Arc::new(move |event: &DebugEvent| {
            collected.lock().unwrap().push(event.clone());
        });
        let mut boxed = Box::new(sink);

        let message = c"vkQueueSubmit: fence is already in use";
        let data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message: message.as_ptr(),
            ..Default::default()
        };

        let result = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                &data,
                std::ptr::from_mut(boxed.as_mut()).cast::<c_void>(),
            )
        };

        assert_eq!(result, vk::FALSE);
        let events = seen.lock().unwrap();
        assert_eq!(
            *events,
            [DebugEvent {
                severity: DebugSeverity::Error,
                category: DebugCategory::Validation,
                message: "vkQueueSubmit: fence is already in use".to_string(),
            }]
        );
    }

    #[test]
    fn callback_contains_sink_panic() {
        let sink: Arc<dyn DebugSink> = Arc::new(|event: &DebugEvent| {
            panic!("sink failed on {}", event.message);
        });
        let mut boxed = Box::new(sink);

        let message = c"vkCreateDevice: unknown extension";
        let data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message: message.as_ptr(),
            ..Default::default()
        };

        let result = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
                &data,
                std::ptr::from_mut(boxed.as_mut()).cast::<c_void>(),
            )
        };

        assert_eq!(result, vk::FALSE);
    }

    #[test]
    fn callback_ignores_missing_data() {
        let result = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
                std::ptr::null(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, vk::FALSE);
    }
}
