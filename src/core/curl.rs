use std::path::Path;

use crate::domain::model::{PresignedPost, PresignedPut};

const STATUS_ARGS: [&str; 5] = ["-sS", "-o", "/dev/null", "-w", "%{http_code}"];

/// curl 的參數列；可直接交給 `Command`，也可輸出成可複製的命令列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurlCommand {
    args: Vec<String>,
}

impl CurlCommand {
    /// `file_name` 是表單中的上傳檔名，與 `file_path` 的檔名不同時以 `;filename=` 指定
    pub fn post(post: &PresignedPost, file_path: &str, file_name: &str) -> Self {
        let mut args: Vec<String> = STATUS_ARGS.iter().map(|s| s.to_string()).collect();
        args.push("-X".to_string());
        args.push("POST".to_string());

        for (name, value) in &post.fields {
            // -F 會把 @ / < 開頭與 ;type= 當作指令
            let flag = if value.starts_with('@') || value.starts_with('<') || value.contains(';')
            {
                "--form-string"
            } else {
                "-F"
            };
            args.push(flag.to_string());
            args.push(format!("{}={}", name, value));
        }

        args.push("-F".to_string());
        args.push(file_part(file_path, file_name));
        args.push(post.url.clone());
        Self { args }
    }

    pub fn put(put: &PresignedPut, file_path: &str) -> Self {
        let mut args: Vec<String> = STATUS_ARGS.iter().map(|s| s.to_string()).collect();
        args.push("--request".to_string());
        args.push("PUT".to_string());
        args.push("--upload-file".to_string());
        args.push(file_path.to_string());

        for (name, value) in &put.headers {
            if name.eq_ignore_ascii_case("host") {
                continue;
            }
            args.push("-H".to_string());
            args.push(format!("{}: {}", name, value));
        }

        args.push(put.url.clone());
        Self { args }
    }

    pub fn get(url: &str, output_path: &str) -> Self {
        let args = vec![
            "-sS".to_string(),
            "-o".to_string(),
            output_path.to_string(),
            "-w".to_string(),
            "%{http_code}".to_string(),
            url.to_string(),
        ];
        Self { args }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn render(&self) -> String {
        let mut line = String::from("curl");
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        line
    }
}

fn file_part(file_path: &str, file_name: &str) -> String {
    let same_name = Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy() == file_name)
        .unwrap_or(false);
    if same_name {
        format!("file=@{}", file_path)
    } else {
        let escaped = file_name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("file=@{};filename=\"{}\"", file_path, escaped)
    }
}

pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
