//! Pure constants: default budgets and role names (Glossary, §4.7).
//!
//! No global mutable state anywhere in the engine (§9) — these are the
//! only "settings" it has, and they are plain `const`s a caller can
//! override per `FillConfig`.

/// Programmatic-API default for `FillConfig::max_turns`. The CLI surface
/// may pick a different default (documented there) — see SPEC_FULL.md §9.
pub const DEFAULT_MAX_TURNS: u32 = 100;
pub const DEFAULT_MAX_ISSUES_PER_TURN: usize = 10;
pub const DEFAULT_MAX_PATCHES_PER_TURN: usize = 20;
pub const DEFAULT_MAX_FIELDS_PER_TURN: usize = usize::MAX;
pub const DEFAULT_MAX_GROUPS_PER_TURN: usize = usize::MAX;

/// The "research" harness preset (Glossary: "research preset: issues=3, groups=1").
pub const RESEARCH_MAX_ISSUES_PER_TURN: usize = 3;
pub const RESEARCH_MAX_GROUPS_PER_TURN: usize = 1;

pub const DEFAULT_ROLES: &[&str] = &["user", "agent"];
pub const DEFAULT_ROLE: &str = "agent";
pub const RESERVED_ROLE: &str = "*";

pub const YEAR_MIN: i32 = 1000;
pub const YEAR_MAX: i32 = 9999;

pub const SKIP_SENTINEL: &str = "%SKIP%";
pub const ABORT_SENTINEL: &str = "%ABORT%";
