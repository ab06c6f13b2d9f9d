//! Model backends

pub mod yolo;

pub use yolo::YoloDetector;
