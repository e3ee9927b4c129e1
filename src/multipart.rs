use rand::Rng;

use crate::request::RequestFile;

/// Encodes a `multipart/form-data` body: one `payload_json` part carrying
/// the JSON payload (if any) alongside named file parts, per §4.B.
///
/// `isahc` has no built-in multipart encoder, unlike the `reqwest`-based
/// clients in the wider corpus, so this crate builds the body by hand
/// rather than pull in a second HTTP stack just for this. Returns the
/// `Content-Type` header value (carrying the boundary) and the encoded
/// body bytes.
pub fn encode(data: Option<&serde_json::Value>, files: &[RequestFile]) -> (String, Vec<u8>) {
    let boundary = random_boundary();
    let mut body = Vec::new();

    if let Some(data) = data {
        write_field(&mut body, &boundary, "payload_json", data);
    }

    for file in files {
        write_file(&mut body, &boundary, file);
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={boundary}"), body)
}

fn random_boundary() -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let boundary: String = (0..32)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect();
    format!("----discordrs-{boundary}")
}

fn write_field(body: &mut Vec<u8>, boundary: &str, name: &str, value: &serde_json::Value) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(&serde_json::to_vec(value).unwrap_or_default());
    body.extend_from_slice(b"\r\n");
}

fn write_file(body: &mut Vec<u8>, boundary: &str, file: &RequestFile) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            file.field_name, file.file_name
        )
        .as_bytes(),
    );
    let content_type = file
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(&file.data);
    body.extend_from_slice(b"\r\n");
}
