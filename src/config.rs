//! Loading app configuration (prompts, praise lines, storage, limits) from TOML.
//!
//! Every section is optional; see `AppConfig` for the schema.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Child addressed in praise messages.
  pub student_name: String,
  pub prompts: Prompts,
  pub storage: StorageCfg,
  pub limits: Limits,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      student_name: "Minh Đăng".into(),
      prompts: Prompts::default(),
      storage: StorageCfg::default(),
      limits: Limits::default(),
    }
  }
}

/// Prompts and canned phrases used around the Gemini client.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub extraction: String,
  /// Placeholders: {name}, {correct}, {total}, {percentage}.
  pub encouragement_template: String,
  /// Used at random when no API key is configured. Placeholder: {name}.
  pub fallback_praises: Vec<String>,
  /// Used when the praise request fails.
  pub failure_praise: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      extraction: "Phân tích ảnh hoặc tài liệu PDF chứa bài tập này và chuyển thành JSON có cấu trúc. Xác định chính xác từng câu hỏi, loại câu hỏi (trắc nghiệm hoặc điền vào chỗ trống), các lựa chọn (nếu có) và đáp án đúng. Với câu trắc nghiệm, đáp án đúng phải trùng với một trong các lựa chọn. Giữ nguyên nội dung gốc của câu hỏi và đáp án.".into(),
      encouragement_template: "Bạn {name} vừa làm xong bài tập và đạt {correct}/{total} điểm ({percentage}%). Hãy viết một lời khen thật độc đáo, vui vẻ và truyền cảm hứng cho bạn ấy. Lời khen ngắn gọn, tích cực, phù hợp với một bé trai.".into(),
      fallback_praises: vec![
        "Làm tốt lắm {name} ơi! Bạn thật siêu!".into(),
        "Tuyệt vời! Bạn đã hoàn thành rất xuất sắc!".into(),
        "Hoan hô {name}! Bạn là một ngôi sao nhỏ!".into(),
        "Giỏi quá! Cứ tiếp tục phát huy nhé bạn!".into(),
      ],
      failure_praise: "Bạn làm tốt lắm!".into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageCfg {
  pub data_dir: String,
  pub key: String,
}

impl Default for StorageCfg {
  fn default() -> Self {
    Self { data_dir: "./data".into(), key: "minhDangExercises".into() }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Limits {
  /// Inline-data ceiling of the extraction service.
  pub max_upload_bytes: usize,
}

impl Default for Limits {
  fn default() -> Self {
    Self { max_upload_bytes: 20 * 1024 * 1024 }
  }
}

/// Load `AppConfig` from APP_CONFIG_PATH, then apply the DATA_DIR override.
/// A missing or broken file falls back to defaults.
pub fn load_app_config_from_env() -> AppConfig {
  let mut cfg = match std::env::var("APP_CONFIG_PATH") {
    Ok(path) => match std::fs::read_to_string(&path) {
      Ok(s) => match parse_app_config(&s) {
        Ok(cfg) => {
          info!(target: "baitap_backend", %path, "Loaded app config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "baitap_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
          AppConfig::default()
        }
      },
      Err(e) => {
        error!(target: "baitap_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
        AppConfig::default()
      }
    },
    Err(_) => AppConfig::default(),
  };

  if let Ok(dir) = std::env::var("DATA_DIR") {
    if !dir.trim().is_empty() {
      cfg.storage.data_dir = dir;
    }
  }
  cfg
}

pub fn parse_app_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}
