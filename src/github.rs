use anyhow::{Context, Result};
use futures::stream::{self, Stream, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{BackupTarget, Config};

/// A remote repository as returned by the repos endpoints; extra fields are ignored
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub clone_url: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// An organization as returned by the orgs endpoints
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrganizationDescriptor {
    pub login: String,
}

/// Non-success response from the GitHub API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("GitHub API returned {status} for {url}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
}

/// Ordered candidate list produced by [`GitHubClient::enumerate`]
#[derive(Debug)]
pub struct Enumeration {
    /// User repositories followed by each organization's repositories
    pub repositories: Vec<RepositoryDescriptor>,
    /// Set when organization discovery stopped early; `repositories` keeps what was fetched
    pub organization_error: Option<anyhow::Error>,
}

/// GitHub REST client scoped to one user and an optional token
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    per_page: u8,
    username: String,
    authenticated: bool,
}

impl GitHubClient {
    /// Create a client; every request carries `Authorization: token ...` when a token is given
    pub fn new(api_url: &str, per_page: u8, username: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("repo-backup/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("token {}", token))
                .context("GitHub token contains characters not allowed in a header")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create GitHub client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            per_page: per_page.max(1),
            username: username.to_string(),
            authenticated: token.is_some(),
        })
    }

    /// Create a client from the loaded configuration and resolved target
    pub fn from_target(config: &Config, target: &BackupTarget) -> Result<Self> {
        Self::new(
            &config.github.api_url,
            config.github.per_page,
            &target.username,
            target.token.as_deref(),
        )
    }

    /// Get the username whose repositories are listed
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether requests carry a token
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Path listing the organizations to back up.
    ///
    /// With a token this is the token owner's memberships, which may differ
    /// from the public memberships of `username`.
    pub fn organizations_path(&self) -> String {
        if self.authenticated {
            "/user/orgs".to_string()
        } else {
            format!("/users/{}/orgs", self.username)
        }
    }

    /// Stream every item of a paginated collection.
    ///
    /// Pages are requested from 1 upward, lazily, and the stream ends at the
    /// first empty page. The first error ends the stream as well.
    pub fn paginate<'a, T>(&'a self, path: String) -> impl Stream<Item = Result<T>> + 'a
    where
        T: DeserializeOwned + 'a,
    {
        stream::try_unfold(1u32, move |page| {
            let path = path.clone();
            async move {
                let items: Vec<T> = self.fetch_page(&path, page).await?;
                if items.is_empty() {
                    debug!("Reached end of {} at page {}", path, page);
                    return Ok::<_, anyhow::Error>(None);
                }
                let page_items = stream::iter(items.into_iter().map(Ok::<T, anyhow::Error>));
                Ok(Some((page_items, page + 1)))
            }
        })
        .try_flatten()
    }

    async fn fetch_page<T: DeserializeOwned>(&self, path: &str, page: u32) -> Result<Vec<T>> {
        let url = format!("{}{}", self.api_url, path);
        debug!("GET {} page {}", url, page);

        let response = self
            .client
            .get(&url)
            .query(&[("page", page.to_string()), ("per_page", self.per_page.to_string())])
            .send()
            .await
            .with_context(|| format!("Failed to request {} page {}", url, page))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { url, status, body }.into());
        }

        response
            .json::<Vec<T>>()
            .await
            .with_context(|| format!("Failed to decode {} page {}", url, page))
    }

    /// List all repositories owned by the user
    pub async fn list_user_repositories(&self) -> Result<Vec<RepositoryDescriptor>> {
        debug!("Fetching user repositories for: {}", self.username);

        let repositories: Vec<RepositoryDescriptor> = self
            .paginate(format!("/users/{}/repos", self.username))
            .try_collect()
            .await?;

        info!("Found {} user repositories", repositories.len());
        Ok(repositories)
    }

    /// List the organizations whose repositories are included
    pub async fn list_organizations(&self) -> Result<Vec<OrganizationDescriptor>> {
        let path = self.organizations_path();
        debug!("Fetching organizations from: {}", path);

        let orgs: Vec<OrganizationDescriptor> = self
            .paginate(path)
            .try_collect()
            .await
            .context("Failed to fetch organizations")?;

        info!(
            "Found {} organizations: {:?}",
            orgs.len(),
            orgs.iter().map(|o| o.login.as_str()).collect::<Vec<_>>()
        );
        Ok(orgs)
    }

    /// Stream the repositories of one organization
    pub fn organization_repositories<'a>(
        &'a self,
        org: &str,
    ) -> impl Stream<Item = Result<RepositoryDescriptor>> + 'a {
        self.paginate(format!("/orgs/{}/repos", org))
    }

    /// List repositories for a specific organization
    pub async fn list_organization_repositories(
        &self,
        org: &str,
    ) -> Result<Vec<RepositoryDescriptor>> {
        let repositories: Vec<RepositoryDescriptor> = self
            .organization_repositories(org)
            .try_collect()
            .await
            .with_context(|| format!("Failed to fetch repositories for organization {}", org))?;

        info!(
            "Found {} repositories for organization: {}",
            repositories.len(),
            org
        );
        Ok(repositories)
    }

    /// Get all repositories: the user's own, then each organization's in order.
    ///
    /// Errors on the user pass are returned. Errors while resolving or paging
    /// organizations stop organization processing and are reported through
    /// [`Enumeration::organization_error`] instead.
    pub async fn enumerate(&self, include_organizations: bool) -> Result<Enumeration> {
        let mut repositories = self.list_user_repositories().await?;

        let organization_error = if include_organizations {
            self.collect_organization_repositories(&mut repositories)
                .await
                .err()
        } else {
            None
        };

        if let Some(e) = &organization_error {
            info!("Organization discovery stopped early: {:#}", e);
        }

        info!("Total repositories: {}", repositories.len());

        Ok(Enumeration {
            repositories,
            organization_error,
        })
    }

    async fn collect_organization_repositories(
        &self,
        repositories: &mut Vec<RepositoryDescriptor>,
    ) -> Result<()> {
        for org in self.list_organizations().await? {
            let mut org_repos = std::pin::pin!(self.organization_repositories(&org.login));
            let mut count = 0usize;

            while let Some(repo) = org_repos
                .try_next()
                .await
                .with_context(|| format!("Failed to fetch repositories for organization {}", org.login))?
            {
                repositories.push(repo);
                count += 1;
            }

            info!("Found {} repositories for organization: {}", count, org.login);
        }

        Ok(())
    }
}
