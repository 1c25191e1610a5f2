// Domain layer: the product row and the ports the host composes against.

pub mod model;
pub mod ports;
