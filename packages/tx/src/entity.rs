//! Entity handles: a path bound to the transaction it is accessed through.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use burrow_disk_store::{
    is_reserved_component, Data, Encoding, HeadStream, StoreError, TailStream,
};
use burrow_path::Fp;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::transaction::DEFAULT_KID_BUFFER;
use crate::{Held, KidIter, Payload, Transaction, TxError};

/// A handle on the entity at one path.
///
/// Handles are cheap to clone and hold no locks themselves; every call goes through the
/// owning [`Transaction`].
#[derive(Debug, Clone)]
pub struct Entity {
    fp: Fp,
    tx: Transaction,
}

impl Entity {
    /// Fails if any component of `fp` is reserved.
    pub fn new(tx: Transaction, fp: Fp) -> Result<Self, TxError> {
        if let Some(component) = fp.iter().find(|c| is_reserved_component(c)) {
            return Err(TxError::ReservedComponent {
                path: fp.clone(),
                component: component.clone(),
            });
        }
        Ok(Self { fp, tx })
    }

    pub(crate) fn from_parts(tx: Transaction, fp: Fp) -> Self {
        Self { fp, tx }
    }

    pub fn fp(&self) -> &Fp {
        &self.fp
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn components(&self) -> &[String] {
        self.fp.components()
    }

    /// The handle at `rel` beneath this one, in the same transaction.
    pub fn kid(&self, rel: &str) -> Result<Entity, TxError> {
        Entity::new(self.tx.clone(), self.fp.child(rel)?)
    }

    /// The handle at `rel` beneath this one, in a new kid transaction locking that subtree.
    ///
    /// The kid transaction must be ended (`entity.tx().end()`) to release the subtree.
    pub async fn kid_tx(&self, rel: &str) -> Result<Entity, TxError> {
        let fp = self.fp.child(rel)?;
        let kid = self.tx.kid(&fp).await?;
        Entity::new(kid, fp)
    }

    /// The parent handle. Never steps above the transaction's root.
    pub fn par(&self) -> Result<Entity, TxError> {
        if &self.fp == self.tx.root() {
            return Err(TxError::NoParent {
                path: self.fp.clone(),
            });
        }
        Ok(Entity::from_parts(self.tx.clone(), self.fp.parent()))
    }

    pub async fn get_data(&self, encoding: Encoding) -> Result<Data, TxError> {
        self.tx.get_data(&self.fp, encoding).await
    }

    pub async fn get_bytes(&self) -> Result<Bytes, TxError> {
        Ok(self.get_data(Encoding::Binary).await?.into_bytes())
    }

    /// The payload as text; invalid UTF-8 is replaced with U+FFFD.
    pub async fn get_text(&self) -> Result<String, TxError> {
        Ok(self.get_data(Encoding::Text).await?.into_text())
    }

    /// The structured payload, `None` when absent.
    pub async fn get_json(&self) -> Result<Option<JsonValue>, TxError> {
        Ok(self.get_data(Encoding::Json).await?.into_json())
    }

    pub async fn get_json_as<T: DeserializeOwned>(&self) -> Result<Option<T>, TxError> {
        let Some(value) = self.get_json().await? else {
            return Ok(None);
        };
        serde_json::from_value(value).map(Some).map_err(|source| {
            TxError::Store(StoreError::NonStructuredPayload {
                path: self.fp.clone(),
                source,
            })
        })
    }

    /// Write the payload. Null and empty values delete it.
    pub async fn set_data(&self, payload: impl Into<Payload>) -> Result<(), TxError> {
        self.tx.set_data(&self.fp, payload).await
    }

    pub async fn set_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), TxError> {
        let value = serde_json::to_value(value).map_err(|source| TxError::Serialize {
            path: self.fp.clone(),
            source,
        })?;
        self.set_data(value).await
    }

    pub async fn get_data_bytes(&self) -> Result<u64, TxError> {
        self.tx.get_data_bytes(&self.fp).await
    }

    /// Whether there is a non-empty payload here.
    pub async fn exists(&self) -> Result<bool, TxError> {
        Ok(self.get_data_bytes().await? > 0)
    }

    /// Remove this entity and everything beneath it.
    pub async fn rem(&self) -> Result<(), TxError> {
        self.tx.rem_subtree(&self.fp).await
    }

    pub async fn head_stream(&self) -> Result<Held<HeadStream>, TxError> {
        self.tx.head_stream(&self.fp).await
    }

    pub async fn tail_stream(&self) -> Result<Held<TailStream>, TxError> {
        self.tx.tail_stream(&self.fp).await
    }

    /// Every child, keyed by name.
    pub async fn get_kids(&self) -> Result<BTreeMap<String, Entity>, TxError> {
        let names = self.tx.get_kid_names(&self.fp).await?;
        names
            .into_iter()
            .map(|name| -> Result<_, TxError> {
                let fp = self.fp.child_components([&name])?;
                Ok((name, Entity::from_parts(self.tx.clone(), fp)))
            })
            .collect()
    }

    /// Lazily iterate the children.
    pub async fn kids(&self) -> Result<KidIter, TxError> {
        self.kids_buffered(DEFAULT_KID_BUFFER).await
    }

    pub async fn kids_buffered(&self, buffer: usize) -> Result<KidIter, TxError> {
        self.tx.iterate_node(&self.fp, buffer).await
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.fp, f)
    }
}
