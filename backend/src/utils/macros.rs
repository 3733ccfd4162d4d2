// FICHIER : backend/src/utils/macros.rs

/// Journalise une `AppError` puis la renvoie (`return Err(..)`) depuis la fonction courante.
///
/// ```ignore
/// raise_error!(AppError::NotFound(format!("Collection {} does not exist", name)));
/// raise_error!(AppError::Io(e), context = json!({ "path": path.to_string_lossy() }));
/// ```
#[macro_export]
macro_rules! raise_error {
    ($err:expr) => {{
        let err: $crate::utils::error::AppError = $err;
        $crate::utils::error::log_error(&err, None);
        return Err(err);
    }};
    ($err:expr, context = $ctx:expr) => {{
        let err: $crate::utils::error::AppError = $err;
        let ctx: serde_json::Value = $ctx;
        $crate::utils::error::log_error(&err, Some(&ctx));
        return Err(err);
    }};
}
