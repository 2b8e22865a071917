// Domain layer: core models and ports (interfaces) for the generation proxy.

pub mod model;
pub mod ports;
