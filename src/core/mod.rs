pub mod canonicalize;
pub mod idgen;

pub use canonicalize::canonicalize;
pub use idgen::new_id;
