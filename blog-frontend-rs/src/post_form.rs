use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use docsync::{DocumentId, RemoteStore, ServerTimestampRequest, UserId};

use crate::error::{ActionError, ValidationError, WriteError};
use crate::post_list::{Post, PostFields, bounded_write, posts_collection};
use crate::timeout::Timer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(from_wasm_abi, into_wasm_abi))]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Title,
    Description,
    Author,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Title, Field::Description, Field::Author];

    /// Form control name.
    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Author => "author",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Title => "Title",
            Field::Description => "Description",
            Field::Author => "Author",
        })
    }
}

/// The form contents. `editing_id` is `None` while creating a new post.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub author: String,
    pub editing_id: Option<DocumentId>,
}

impl Draft {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
            Field::Author => &self.author,
        }
    }

    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
            Field::Author => &mut self.author,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing_id.is_some()
    }

    /// Every field must contain something other than whitespace.
    pub fn validate(&self) -> Result<PostFields, ValidationError> {
        if let Some(field) = Field::ALL
            .into_iter()
            .find(|field| self.get(*field).trim().is_empty())
        {
            return Err(ValidationError::EmptyField(field));
        }
        Ok(PostFields {
            title: self.title.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submitted {
    Created(DocumentId),
    Updated(DocumentId),
}

/// Owns the draft and turns it into create or update requests.
///
/// A successful submit only means the store accepted the request. The post shows up in the list with
/// the next snapshot.
pub struct PostFormController<S> {
    store: Rc<S>,
    application_id: String,
    write_timeout: Duration,
    timer: Rc<dyn Timer>,
    draft: RefCell<Draft>,
}

impl<S: RemoteStore<PostFields>> PostFormController<S> {
    pub fn new(
        store: Rc<S>,
        application_id: impl Into<String>,
        write_timeout: Duration,
        timer: Rc<dyn Timer>,
    ) -> Self {
        Self {
            store,
            application_id: application_id.into(),
            write_timeout,
            timer,
            draft: RefCell::new(Draft::default()),
        }
    }

    pub fn draft(&self) -> Draft {
        self.draft.borrow().clone()
    }

    pub fn set_field(&self, field: Field, value: impl Into<String>) {
        *self.draft.borrow_mut().slot(field) = value.into();
    }

    pub fn start_edit(&self, post: &Post) {
        self.draft.replace(Draft {
            title: post.title.clone(),
            description: post.description.clone(),
            author: post.author.clone(),
            editing_id: Some(post.id.clone()),
        });
    }

    pub fn cancel(&self) {
        self.draft.replace(Draft::default());
    }

    /// Validates the draft and sends it. On failure the draft is left untouched. On success it is
    /// reset, unless it was changed while the write was in flight.
    pub async fn submit(&self, user: Option<&UserId>) -> Result<Submitted, ActionError> {
        let sent = self.draft();
        let fields = sent.validate()?;
        let editing_id = sent.editing_id.clone();
        let user = user.ok_or(ValidationError::NotAuthenticated)?;
        let collection =
            posts_collection(&self.application_id, user).map_err(WriteError::from)?;

        let result = match editing_id {
            Some(id) => {
                let document = collection.document(&id);
                log::info!("Updating {document}");
                bounded_write(
                    &*self.timer,
                    self.write_timeout,
                    self.store.update(&document, fields),
                )
                .await
                .map(|()| Submitted::Updated(id))
            }
            None => {
                log::info!("Creating post in {collection}");
                bounded_write(
                    &*self.timer,
                    self.write_timeout,
                    self.store
                        .create(&collection, fields, ServerTimestampRequest::now()),
                )
                .await
                .map(Submitted::Created)
            }
        };

        match result {
            Ok(submitted) => {
                log::info!("Submit accepted: {submitted:?}");
                let mut draft = self.draft.borrow_mut();
                if *draft == sent {
                    *draft = Draft::default();
                } else {
                    log::debug!("Draft changed during submit, keeping it");
                }
                Ok(submitted)
            }
            Err(e) => {
                log::error!("Submit failed: {e}");
                Err(e.into())
            }
        }
    }
}
