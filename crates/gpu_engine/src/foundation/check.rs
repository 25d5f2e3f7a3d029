//! Contract checking macros
//!
//! Misuse of the GPU layer (malformed descriptors, mismatched render targets,
//! binding the wrong resource type) is a programming error, so it is reported
//! by aborting rather than through `Result`.
//!
//! - [`check!`] and [`check_msg!`] are only evaluated when `debug_assertions`
//!   is enabled. In release builds the condition is not evaluated at all.
//! - [`fatal!`] is always active. It logs the message before panicking so the
//!   diagnostic ends up in the engine log as well as on stderr.

/// Abort with a logged diagnostic message
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);
        $crate::foundation::logging::error!("Fatal error: {}", message);
        panic!("{}", message);
    }};
}

/// Debug-only assertion which aborts through [`fatal!`]
#[macro_export]
macro_rules! check {
    ($cond:expr) => {
        if cfg!(debug_assertions) && !($cond) {
            $crate::fatal!("Check failed: {}", stringify!($cond));
        }
    };
}

/// Debug-only assertion with a formatted message
#[macro_export]
macro_rules! check_msg {
    ($cond:expr, $($arg:tt)+) => {
        if cfg!(debug_assertions) && !($cond) {
            $crate::fatal!($($arg)+);
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_check_passes() {
        check!(1 + 1 == 2);
        check_msg!(true, "never printed {}", 42);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Check failed: 1 == 2")]
    fn test_check_fails_in_debug() {
        check!(1 == 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Member 'foo' not found")]
    fn test_check_msg_formats() {
        check_msg!(false, "Member '{}' not found", "foo");
    }

    #[test]
    #[should_panic(expected = "GL framebuffer error")]
    fn test_fatal_always_panics() {
        fatal!("GL framebuffer error");
    }
}
