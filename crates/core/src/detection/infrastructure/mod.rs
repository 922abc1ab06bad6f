pub mod face_limit_detector;
pub mod frame_throttle;
pub mod replay_face_detector;
