//! Typed conversation selection.

use std::future::Future;

use swapchat_client::{BackendClient, ClientError};
use swapchat_core::Counterpart;
use swapchat_proto::rest::{ChatSummary, UserInfo};
use tracing::debug;

/// User lookups needed to open conversations.
pub trait Directory: Send + Sync {
    /// Display metadata for a counterpart id.
    fn user_info(&self, uuid: &str) -> impl Future<Output = Result<UserInfo, ClientError>> + Send;

    /// Conversations the current user has taken part in.
    fn previous_chats(&self) -> impl Future<Output = Result<Vec<ChatSummary>, ClientError>> + Send;
}

impl Directory for BackendClient {
    fn user_info(&self, uuid: &str) -> impl Future<Output = Result<UserInfo, ClientError>> + Send {
        BackendClient::user_info(self, uuid)
    }

    fn previous_chats(&self) -> impl Future<Output = Result<Vec<ChatSummary>, ClientError>> + Send {
        BackendClient::previous_chats(self)
    }
}

/// Which conversation to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSelection {
    /// Picked from the conversation list; metadata is already known
    Listed(ChatSummary),
    /// Opened by counterpart id; metadata must be looked up
    DirectLink {
        /// Counterpart id
        uuid: String,
    },
}

impl SessionSelection {
    /// Counterpart id of the selection.
    pub fn to(&self) -> &str {
        match self {
            Self::Listed(chat) => &chat.convo_id,
            Self::DirectLink { uuid } => uuid,
        }
    }

    /// Resolve to a counterpart, looking up direct links.
    pub async fn resolve<D: Directory>(self, directory: &D) -> Result<Counterpart, ClientError> {
        match self {
            Self::Listed(chat) => {
                Ok(Counterpart { to: chat.convo_id, name: chat.name, profile_pic: chat.profile_pic })
            },
            Self::DirectLink { uuid } => {
                let info = directory.user_info(&uuid).await?;
                debug!(%uuid, name = %info.name, "resolved direct link");
                Ok(Counterpart { to: uuid, name: info.name, profile_pic: info.profile_pic })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDirectory;

    impl Directory for FixedDirectory {
        fn user_info(&self, uuid: &str) -> impl Future<Output = Result<UserInfo, ClientError>> + Send {
            let result = match uuid {
                "u-2" => Ok(UserInfo { name: "Grace".into(), profile_pic: Some("https://cdn/grace.png".into()) }),
                _ => Err(ClientError::Status { status: 404, message: "User not found".into() }),
            };
            std::future::ready(result)
        }

        fn previous_chats(&self) -> impl Future<Output = Result<Vec<ChatSummary>, ClientError>> + Send {
            std::future::ready(Ok(vec![]))
        }
    }

    #[tokio::test]
    async fn listed_selection_needs_no_lookup() {
        let chat = ChatSummary { convo_id: "u-9".into(), name: "Linus".into(), profile_pic: None };
        let selection = SessionSelection::Listed(chat);
        assert_eq!(selection.to(), "u-9");

        let counterpart = selection.resolve(&FixedDirectory).await.unwrap();
        assert_eq!(counterpart, Counterpart { to: "u-9".into(), name: "Linus".into(), profile_pic: None });
    }

    #[tokio::test]
    async fn direct_link_looks_up_name() {
        let counterpart = SessionSelection::DirectLink { uuid: "u-2".into() }.resolve(&FixedDirectory).await.unwrap();
        assert_eq!(counterpart.name, "Grace");
        assert_eq!(counterpart.profile_pic.as_deref(), Some("https://cdn/grace.png"));

        let missing = SessionSelection::DirectLink { uuid: "nobody".into() }.resolve(&FixedDirectory).await;
        assert!(matches!(missing, Err(ClientError::Status { status: 404, .. })));
    }
}
