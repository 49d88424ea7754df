pub mod consts;
pub mod detection;
pub mod error;
pub mod fit;
pub mod frame;
pub mod io;
pub mod pipeline;
pub mod roi;
