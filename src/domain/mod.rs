// Domain layer: import models and ports (store / module catalog). Only std/serde/chrono here.

pub mod model;
pub mod ports;
