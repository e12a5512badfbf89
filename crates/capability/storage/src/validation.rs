//! 验证辅助函数
//!
//! API 名称直接作为暂存目录名，必须是单段、非隐藏的路径分量。

use domain::is_valid_queue_name;

use crate::error::StorageError;

/// 验证 API 名称可作为目录名
pub fn ensure_api_name(api_name: &str) -> Result<(), StorageError> {
    let trimmed = api_name.trim();
    if trimmed.is_empty() {
        return Err(StorageError::new("api name required"));
    }
    if !is_valid_queue_name(api_name) {
        return Err(StorageError::new(format!(
            "api name {:?} is not a valid directory name",
            api_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_like_names() {
        assert!(ensure_api_name("ApiA").is_ok());
        assert!(ensure_api_name("site-2 api").is_ok());
        for name in ["", " ", "..", ".hidden", "a/b", "a\\b", " padded"] {
            assert!(ensure_api_name(name).is_err(), "{name}");
        }
    }
}
