// Deterministic matching primitives shared by resolution and filling:
// option matching, the locale tables behind it, and relative date parsing.

pub mod dates;
pub mod dictionary;
pub mod fuzzy;
pub mod handlers;
pub mod text;
