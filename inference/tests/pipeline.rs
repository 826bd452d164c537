use std::{io::Cursor, sync::Arc, thread};

use architectures::{
    Adapter, ArchitectureSpec, Family, HeadActivation, InferenceGraph, catalog::PRETRAINING_CLASSES,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use inference::{InferErr, Labels, Pipeline, Preprocessor};
use nn::{Device, Module, StateDict, init::Initializer};

fn graph(name: &str, activation: HeadActivation) -> Arc<InferenceGraph> {
    let graph = Adapter::new()
        .seed(Some(7))
        .head_activation(activation)
        .build(&ArchitectureSpec::new(name, "none"))
        .unwrap();

    Arc::new(graph.freeze())
}

fn pipeline(name: &str) -> Pipeline {
    Pipeline::new(graph(name, HeadActivation::None), Labels::default()).unwrap()
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

fn gradient(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    encode(DynamicImage::ImageRgb8(image), ImageFormat::Png)
}

#[test]
fn predictions_are_idempotent() {
    let pipeline = pipeline("mobilenet_v3_small");
    let bytes = gradient(320, 240);

    let first = pipeline.predict(&bytes).unwrap();
    let second = pipeline.predict(&bytes).unwrap();

    assert_eq!(first, second);
    assert!(["Healthy", "Infected"].contains(&first.label.as_str()));
    assert!((0.5..=1.).contains(&first.confidence));
}

#[test]
fn concurrent_predictions_agree() {
    let pipeline = Arc::new(pipeline("mobilenet_v3_small"));
    let bytes = Arc::new(gradient(200, 260));
    let expected = pipeline.predict(&bytes).unwrap();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let bytes = Arc::clone(&bytes);
            thread::spawn(move || pipeline.predict(&bytes).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn sigmoid_heads_are_not_squashed_twice() {
    let raw = Pipeline::new(
        graph("mobilenet_v3_small", HeadActivation::None),
        Labels::default(),
    )
    .unwrap();
    let squashed = Pipeline::new(
        graph("mobilenet_v3_small", HeadActivation::Sigmoid),
        Labels::default(),
    )
    .unwrap();

    let bytes = gradient(256, 256);
    let a = raw.predict(&bytes).unwrap();
    let b = squashed.predict(&bytes).unwrap();

    assert_eq!(a.label, b.label);
    assert!((a.confidence - b.confidence).abs() < 1e-5);
}

#[test]
fn truncated_images_fail_to_load() {
    let pipeline = pipeline("mobilenet_v3_small");
    let bytes = gradient(64, 64);

    let err = pipeline.predict(&bytes[..bytes.len() / 2]).unwrap_err();
    assert!(matches!(err, InferErr::ImageLoad(_)));

    let err = pipeline.predict(b"").unwrap_err();
    assert!(matches!(err, InferErr::ImageLoad(_)));
}

#[test]
fn missing_files_fail_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let err = pipeline("mobilenet_v3_small")
        .predict_path(dir.path().join("missing.png"))
        .unwrap_err();

    assert!(matches!(err, InferErr::ImageLoad(_)));
}

#[test]
fn alpha_and_jpeg_inputs_are_accepted() {
    let pipeline = pipeline("mobilenet_v3_small");

    let rgba = RgbaImage::from_pixel(300, 300, Rgba([200, 10, 10, 0]));
    assert!(pipeline
        .predict(&encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png))
        .is_ok());

    let jpeg = encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(240, 320, Rgb([30, 120, 60]))),
        ImageFormat::Jpeg,
    );
    assert!(pipeline.predict(&jpeg).is_ok());
}

#[test]
fn resnet18_pretrained_and_fine_tuned_on_a_solid_image() {
    let dir = tempfile::tempdir().unwrap();

    let mut pretrained = Family::Resnet18.network(PRETRAINING_CLASSES);
    pretrained.reset_parameters(&Initializer::new(Some(1))).unwrap();
    StateDict::from_module(&pretrained)
        .write(dir.path().join("resnet18-IMAGENET1K_V1.safetensors"))
        .unwrap();

    let adapter = Adapter::new().weights_dir(dir.path()).seed(Some(2));
    let spec = ArchitectureSpec::new("resnet18", "DEFAULT");

    let checkpoint = dir.path().join("fine_tuned.safetensors");
    adapter.build(&spec).unwrap().save_checkpoint(&checkpoint).unwrap();

    let mut graph = adapter.build(&spec).unwrap();
    graph.load_checkpoint(&checkpoint).unwrap();
    let graph = Arc::new(graph.freeze());

    let bytes = encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(500, 500, Rgb([120, 180, 90]))),
        ImageFormat::Png,
    );

    let tensor = Preprocessor::new(graph.preprocess())
        .unwrap()
        .prepare(&bytes, Device::Cpu)
        .unwrap();
    assert_eq!(tensor.shape(), &[1, 3, 224, 224]);

    let result = Pipeline::new(graph, Labels::default())
        .unwrap()
        .predict(&bytes)
        .unwrap();
    assert!(["Healthy", "Infected"].contains(&result.label.as_str()));
    assert!(result.confidence >= 0.5);
}
