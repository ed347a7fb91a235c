pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible to the binary that
// builds the web server router.
pub use rest::{
    get_current_question_handler, read_report_handler, start_report_handler,
    start_session_handler, submit_answer_handler,
};
