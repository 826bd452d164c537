mod affine;
mod batch_norm;
mod concat;
mod conv;
mod layer;
mod linear;
mod pool;
mod residual;
mod scale;
mod shape;

pub use affine::ChannelAffine;
pub use batch_norm::BatchNorm2d;
pub use concat::Concat;
pub use conv::Conv2d;
pub use layer::Layer;
pub use linear::Linear;
pub use pool::{AvgPool2d, GlobalAvgPool, MaxPool2d};
pub use residual::Residual;
pub use scale::Scale;
pub use shape::{Dropout, Flatten};
