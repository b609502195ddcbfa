use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match interview_server::start_server().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("interview-server failed: {e}");
            ExitCode::FAILURE
        }
    }
}
