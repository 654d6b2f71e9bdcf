//! L9 — derived, read-only projections of a `ParsedForm` (spec §4.9).

mod report;
mod schema;
mod values;

pub use report::render_report;
pub use schema::form_schema;
pub use values::values_map;
