mod cli;
mod demo;
mod infra;
mod quote;
mod routes;
mod server;

use care_rota::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
