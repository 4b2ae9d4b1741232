#![allow(dead_code)]

use candle_core::{DType, Device, Tensor};
use std::collections::HashMap;
use std::path::Path;

pub const MODEL_NAME: &str = "MEGNet-MP-2018.6.1-Eform";

pub fn checkpoint_json() -> String {
    serde_json::json!({
        "@class": "MEGNet",
        "@module": "matgl.models._megnet",
        "@model_version": 1,
        "metadata": null,
        "kwargs": {"nblocks": 3, "dim_node_embedding": 16, "cutoff": 4.0},
    })
    .to_string()
}

/// Writes a `state.safetensors` with two small parameter tensors.
pub fn write_state(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    let mut tensors = HashMap::new();
    tensors.insert(
        "layer.weight".to_string(),
        Tensor::zeros((3, 2), DType::F32, &Device::Cpu).unwrap(),
    );
    tensors.insert(
        "layer.bias".to_string(),
        Tensor::zeros(3, DType::F32, &Device::Cpu).unwrap(),
    );
    candle_core::safetensors::save(&tensors, dir.join("state.safetensors")).unwrap();
}
