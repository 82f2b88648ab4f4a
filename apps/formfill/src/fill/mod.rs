// Fill orchestration: the convergence loop, its per-session state, the traits
// it drives the page through, and a declarative page for dry runs.

pub mod handlers;
pub mod orchestrator;
pub mod page;
pub mod session;
pub mod snapshot;
