use crate::color::{
    MaybePaint, ERROR_INDICATOR, MESSAGE_TEXT, NOTE_INDICATOR, WARNING_INDICATOR,
};
use nu_ansi_term::Style;

pub const DEFAULT_EXIT_CODE: i32 = 1;

fn report(indicator: Style, label: &str, text: &str) {
    eprintln!(
        "{} {}",
        indicator.maybe_paint(label),
        MESSAGE_TEXT.maybe_paint(text)
    );
}

pub(crate) fn error_internal(text: &str) {
    report(*ERROR_INDICATOR, "error:", text);
}

pub(crate) fn warn_internal(text: &str) {
    report(*WARNING_INDICATOR, "warning:", text);
}

pub(crate) fn note_internal(text: &str) {
    report(*NOTE_INDICATOR, "note:", text);
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::warn_internal(&formatted);
    })
}

#[macro_export]
macro_rules! note {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::note_internal(&formatted);
    })
}

#[macro_export]
macro_rules! die {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
        ::std::process::exit($crate::utils::errors::DEFAULT_EXIT_CODE);
    })
}
