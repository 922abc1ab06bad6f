pub mod capture {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod infrastructure {
        pub mod image_sequence_source;
        pub mod synthetic_camera;
    }
}

pub mod detection {
    pub mod domain {
        pub mod capabilities;
        pub mod face_detector;
        pub mod face_detector_mode;
    }
    pub mod infrastructure;
}

pub mod output {
    pub mod domain {
        pub mod metrics_sink;
        pub mod overlay_renderer;
    }
    pub mod infrastructure {
        pub mod csv_metrics_sink;
        pub mod image_overlay_renderer;
    }
}

pub mod pipeline {
    pub mod consumer_loop;
    pub mod detection_session;
    pub mod frame_rate_tracker;
    pub mod listeners;
    pub mod pipeline_logger;
    pub mod result_channel;
    pub mod session_config;
    pub mod status_monitor;
}

pub mod shared {
    pub mod constants;
    pub mod face;
    pub mod frame;
    pub mod region;
}
