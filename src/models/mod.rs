pub mod check_result;
pub mod cursor;
pub mod target;

pub use check_result::CheckResult;
pub use cursor::Cursor;
pub use target::Target;
