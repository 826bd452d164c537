use std::{env, process::ExitCode};

use log::{error, info};
use rayon::prelude::*;
use serde_json::json;

use service::{MemoryStore, PredictionService, ServiceConfig};

fn main() -> ExitCode {
    env_logger::init();

    let images: Vec<String> = env::args().skip(1).collect();

    let service = match ServiceConfig::from_env()
        .and_then(|config| PredictionService::start(&config, MemoryStore::new()))
    {
        Ok(service) => service,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!("classifying {} images", images.len());

    let lines: Vec<_> = images
        .par_iter()
        .map(|image| match service.predict_path(image) {
            Ok(result) => json!({
                "image": image,
                "label": result.label,
                "confidence": result.confidence,
            }),
            Err(e) => json!({ "image": image, "error": e.to_string() }),
        })
        .collect();

    for line in lines {
        println!("{line}");
    }

    ExitCode::SUCCESS
}
