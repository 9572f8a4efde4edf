// Application layer: the concrete flows built on the core engine.

pub mod flows;
