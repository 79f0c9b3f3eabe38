/// Validation layer plumbing: messages go to the prism logger and are counted per severity

use ash::vk;
use prism_gpu::log::{dispatch, LogSeverity};
use std::ffi::{c_char, CStr};
use std::sync::atomic::{AtomicU32, Ordering};

const SOURCE: &str = "prism::vulkan::validation";

/// Validation message counts since device creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

// Indexed by `bucket()`: error, warning, info, verbose
static COUNTERS: [AtomicU32; 4] = [
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
];

fn bucket(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> (usize, LogSeverity) {
    use vk::DebugUtilsMessageSeverityFlagsEXT as S;
    if severity.contains(S::ERROR) {
        (0, LogSeverity::Error)
    } else if severity.contains(S::WARNING) {
        (1, LogSeverity::Warn)
    } else if severity.contains(S::INFO) {
        (2, LogSeverity::Info)
    } else {
        (3, LogSeverity::Debug)
    }
}

/// Current validation statistics
pub fn get_validation_stats() -> ValidationStats {
    let load = |i: usize| COUNTERS[i].load(Ordering::Relaxed);
    ValidationStats {
        errors: load(0),
        warnings: load(1),
        info: load(2),
        verbose: load(3),
    }
}

pub(crate) fn reset_validation_stats() {
    for counter in &COUNTERS {
        counter.store(0, Ordering::Relaxed);
    }
}

/// Messenger create info with every severity and type enabled
pub(crate) fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    use vk::DebugUtilsMessageSeverityFlagsEXT as S;
    use vk::DebugUtilsMessageTypeFlagsEXT as T;
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(S::ERROR | S::WARNING | S::INFO | S::VERBOSE)
        .message_type(T::GENERAL | T::VALIDATION | T::PERFORMANCE)
        .pfn_user_callback(Some(vulkan_debug_callback))
}

unsafe fn c_text<'a>(ptr: *const c_char, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        fallback.into()
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let (index, severity) = bucket(message_severity);
    COUNTERS[index].fetch_add(1, Ordering::Relaxed);

    if let Some(data) = p_callback_data.as_ref() {
        let id = c_text(data.p_message_id_name, "Unknown");
        let message = c_text(data.p_message, "No message");
        let location = (severity == LogSeverity::Error).then_some((file!(), line!()));
        dispatch(
            severity,
            SOURCE,
            format!("[{:?}] {}: {}", message_type, id, message),
            location,
        );
    }

    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
