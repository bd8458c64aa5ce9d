#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(not(target_arch = "wasm32"))]
use uuid::Uuid;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["self", "crypto"])]
    fn randomUUID() -> String;
}

const DOCUMENT_ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of the ids the hosted document store hands out for new documents.
pub const DOCUMENT_ID_LEN: usize = 20;

pub fn get_uuid() -> String {
    #[cfg(target_arch = "wasm32")]
    {
        randomUUID()
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        Uuid::new_v4().to_string()
    }
}

/// Anonymous accounts are identified by the hex digits of a fresh uuid.
pub fn get_user_id() -> String {
    get_uuid().replace('-', "")
}

/// A 20 character alphanumeric id, shaped like the auto-ids of the hosted store.
pub fn get_document_id() -> String {
    let mut id = String::with_capacity(DOCUMENT_ID_LEN);
    while id.len() < DOCUMENT_ID_LEN {
        let entropy = get_uuid();
        for pair in entropy
            .as_bytes()
            .chunks(2)
            .filter(|pair| pair.iter().all(u8::is_ascii_hexdigit))
        {
            if id.len() == DOCUMENT_ID_LEN {
                break;
            }
            let Ok(hex) = std::str::from_utf8(pair) else {
                continue;
            };
            let Ok(byte) = u8::from_str_radix(hex, 16) else {
                continue;
            };
            // reject bytes past the last full multiple of 62
            if byte < 248 {
                let index = byte as usize % DOCUMENT_ID_ALPHABET.len();
                id.push(DOCUMENT_ID_ALPHABET[index] as char);
            }
        }
    }
    id
}
