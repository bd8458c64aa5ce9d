use std::rc::Rc;

use docsync::memory::{MemoryIdentity, MemoryStore};
use wasm_bindgen::prelude::*;

use crate::view::{Intent, ViewModel};
use crate::{AppConfig, BlogApp, PostFields};

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// The client running against the in-process backend, for previews in the browser.
///
/// wasm-bindgen types can't be generic, hence the wrapper around a concrete [`BlogApp`].
#[wasm_bindgen]
pub struct BlogPreview {
    app: BlogApp<MemoryIdentity, MemoryStore<PostFields>>,
}

#[wasm_bindgen]
impl BlogPreview {
    /// Users of the preview are always signed in anonymously.
    #[wasm_bindgen(constructor)]
    pub fn new(application_id: String, credentials_json: String) -> Result<BlogPreview, JsValue> {
        let config = AppConfig::from_json(&application_id, &credentials_json, None).map_err(to_js)?;
        let app = BlogApp::new(
            config,
            Rc::new(MemoryIdentity::new()),
            Rc::new(MemoryStore::new()),
        )
        .map_err(to_js)?;
        Ok(Self { app })
    }

    pub async fn start(&self) -> usize {
        self.app.process_auth_events().await
    }

    pub async fn dispatch(&self, intent: Intent) -> Result<(), JsValue> {
        self.app.dispatch(intent).await.map_err(to_js)
    }

    pub async fn dispatch_json(&self, json: String) -> Result<(), JsValue> {
        self.app.dispatch_json(&json).await.map_err(to_js)
    }

    pub fn view(&self) -> ViewModel {
        self.app.view()
    }

    pub fn render(&self) -> String {
        self.app.render()
    }

    pub fn shutdown(&self) {
        self.app.shutdown();
    }
}
