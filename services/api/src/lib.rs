mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use rider_recall::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
