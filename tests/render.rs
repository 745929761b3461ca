#[path = "render/live.rs"]
mod live;
#[path = "render/probe_fallback.rs"]
mod probe_fallback;
#[path = "support/fake_python.rs"]
mod fake_python;
