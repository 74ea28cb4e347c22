pub mod client;
pub mod error;
pub mod oauth;
pub mod rest_types;

pub use client::{
    GitHubClient, GitHubClientConfig, GitHubClientFactory, RepositoryApi, RepositoryApiProvider,
};
pub use error::{CredentialRefreshError, FetchError};
pub use oauth::{
    OAuthClientConfig, OAuthTokenExchange, PersonalAccessToken, TokenExchange, TokenSource,
};
