pub mod cli;
pub mod context;
pub mod io;
pub mod model;
pub mod ops;
pub mod util;
