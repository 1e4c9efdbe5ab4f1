//! Gitea API client implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::domain::ports::{GiteaClient, GiteaPullRequest, GiteaRepo, GiteaTimelineEvent};
use crate::error::GiteaError;

/// Attempts made for idempotent reads
const READ_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Implementation of the Gitea API client
pub struct GiteaClientImpl {
    http: Client,
    base_url: String,
    admin_token: String,
}

impl GiteaClientImpl {
    pub fn new(base_url: String, admin_token: String) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_token,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("Authorization", format!("token {}", self.admin_token))
    }

    /// GET with a bounded retry on transport errors and 5xx responses
    async fn get(&self, url: &str) -> Result<reqwest::Response, GiteaError> {
        let mut attempt = 1;
        loop {
            let result = self.authed(self.http.get(url)).send().await;
            let retryable = match &result {
                Ok(resp) => resp.status().is_server_error(),
                Err(e) => e.is_connect() || e.is_timeout(),
            };
            if !retryable || attempt >= READ_ATTEMPTS {
                return Ok(result?);
            }
            tracing::debug!(url, attempt, "Gitea read failed, retrying");
            attempt += 1;
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GiteaError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| GiteaError::Deserialization(e.to_string()))
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<(), GiteaError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn error_from(response: reqwest::Response) -> GiteaError {
        match response.status() {
            StatusCode::UNAUTHORIZED => GiteaError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => GiteaError::RateLimited,
            status => GiteaError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            },
        }
    }

    fn pr_not_found(owner: &str, repo: &str, number: i64) -> GiteaError {
        GiteaError::PullRequestNotFound {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        }
    }
}

/// Request types for Gitea API
#[derive(Serialize)]
struct CreatePRRequest<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    head: &'a str,
    base: &'a str,
}

#[derive(Serialize)]
struct MergePRRequest<'a> {
    #[serde(rename = "Do")]
    do_merge: &'a str,
}

#[derive(Serialize)]
struct CreateBranchRequest<'a> {
    new_branch_name: &'a str,
    old_branch_name: &'a str,
}

#[derive(Serialize)]
struct FileRequest<'a> {
    content: String,
    message: &'a str,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Deserialize)]
struct GiteaTeamResponse {
    id: i64,
    name: String,
}

#[derive(Deserialize)]
struct TeamMember {
    login: String,
}

#[derive(Deserialize)]
struct FileContentsResponse {
    sha: String,
}

#[async_trait]
impl GiteaClient for GiteaClientImpl {
    async fn is_org_member(&self, org: &str, username: &str) -> Result<bool, GiteaError> {
        let resp = self
            .get(&self.api_url(&format!("/orgs/{}/members/{}", org, username)))
            .await?;

        match resp.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_from(resp).await),
        }
    }

    async fn list_team_members(&self, org: &str, team: &str) -> Result<Vec<String>, GiteaError> {
        let resp = self.get(&self.api_url(&format!("/orgs/{}/teams", org))).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(vec![]);
        }

        let teams: Vec<GiteaTeamResponse> = self.handle_response(resp).await?;
        let Some(team) = teams.iter().find(|t| t.name == team) else {
            return Ok(vec![]);
        };

        let resp = self
            .get(&self.api_url(&format!("/teams/{}/members", team.id)))
            .await?;
        let members: Vec<TeamMember> = self.handle_response(resp).await?;
        Ok(members.into_iter().map(|m| m.login).collect())
    }

    async fn get_repo(&self, owner: &str, name: &str) -> Result<GiteaRepo, GiteaError> {
        let resp = self
            .get(&self.api_url(&format!("/repos/{}/{}", owner, name)))
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(GiteaError::RepoNotFound {
                owner: owner.to_string(),
                repo: name.to_string(),
            });
        }

        self.handle_response(resp).await
    }

    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<(), GiteaError> {
        use base64::Engine;
        let url = self.api_url(&format!("/repos/{}/{}/contents/{}", owner, repo, path));

        // Overwriting needs the current blob sha
        let existing = self
            .get(&format!("{}?ref={}", url, encode(branch)))
            .await?;
        let sha = if existing.status().is_success() {
            let file: FileContentsResponse = self.handle_response(existing).await?;
            Some(file.sha)
        } else {
            None
        };

        let body = FileRequest {
            content: base64::engine::general_purpose::STANDARD.encode(content),
            message,
            branch,
            sha: sha.clone(),
        };
        let req = if sha.is_some() {
            self.http.put(&url)
        } else {
            self.http.post(&url)
        };
        let resp = self.authed(req).json(&body).send().await?;

        self.handle_empty_response(resp).await
    }

    async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        new_branch: &str,
        from_branch: &str,
    ) -> Result<(), GiteaError> {
        let resp = self
            .authed(
                self.http
                    .post(self.api_url(&format!("/repos/{}/{}/branches", owner, repo))),
            )
            .json(&CreateBranchRequest {
                new_branch_name: new_branch,
                old_branch_name: from_branch,
            })
            .send()
            .await?;

        // Already there from an earlier attempt
        if resp.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        self.handle_empty_response(resp).await
    }

    async fn delete_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<(), GiteaError> {
        let resp = self
            .authed(self.http.delete(self.api_url(&format!(
                "/repos/{}/{}/branches/{}",
                owner,
                repo,
                encode(branch)
            ))))
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.handle_empty_response(resp).await
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: Option<&str>,
        head: &str,
        base: &str,
    ) -> Result<GiteaPullRequest, GiteaError> {
        let resp = self
            .authed(
                self.http
                    .post(self.api_url(&format!("/repos/{}/{}/pulls", owner, repo))),
            )
            .json(&CreatePRRequest {
                title,
                body,
                head,
                base,
            })
            .send()
            .await?;

        self.handle_response(resp).await
    }

    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<GiteaPullRequest, GiteaError> {
        let resp = self
            .get(&self.api_url(&format!("/repos/{}/{}/pulls/{}", owner, repo, number)))
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Self::pr_not_found(owner, repo, number));
        }
        self.handle_response(resp).await
    }

    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: Option<&str>,
    ) -> Result<Vec<GiteaPullRequest>, GiteaError> {
        let mut url = self.api_url(&format!("/repos/{}/{}/pulls", owner, repo));
        if let Some(s) = state {
            url.push_str(&format!("?state={}", s));
        }

        let resp = self.get(&url).await?;
        self.handle_response(resp).await
    }

    async fn update_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<(), GiteaError> {
        let resp = self
            .authed(self.http.post(self.api_url(&format!(
                "/repos/{}/{}/pulls/{}/update?style=rebase",
                owner, repo, number
            ))))
            .send()
            .await?;

        self.handle_empty_response(resp).await
    }

    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        merge_style: &str,
    ) -> Result<(), GiteaError> {
        let resp = self
            .authed(self.http.post(self.api_url(&format!(
                "/repos/{}/{}/pulls/{}/merge",
                owner, repo, number
            ))))
            .json(&MergePRRequest {
                do_merge: merge_style,
            })
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Self::pr_not_found(owner, repo, number));
        }
        self.handle_empty_response(resp).await
    }

    async fn close_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<(), GiteaError> {
        let resp = self
            .authed(self.http.patch(self.api_url(&format!(
                "/repos/{}/{}/pulls/{}",
                owner, repo, number
            ))))
            .json(&serde_json::json!({"state": "closed"}))
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Self::pr_not_found(owner, repo, number));
        }
        self.handle_empty_response(resp).await
    }

    async fn get_timeline(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Vec<GiteaTimelineEvent>, GiteaError> {
        let resp = self
            .get(&self.api_url(&format!(
                "/repos/{}/{}/issues/{}/timeline",
                owner, repo, number
            )))
            .await?;

        self.handle_response(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_strips_trailing_slash() {
        let client = GiteaClientImpl::new("https://git.example.com/".into(), "t".into());
        assert_eq!(
            client.api_url("/repos/a/b"),
            "https://git.example.com/api/v1/repos/a/b"
        );
    }

    #[test]
    fn pull_request_tolerates_null_labels() {
        let raw = serde_json::json!({
            "id": 1, "number": 3, "title": "t", "body": null, "state": "open",
            "html_url": "https://git.example.com/o/r/pulls/3",
            "head": {"ref": "pkg-foo", "sha": "a"},
            "base": {"ref": "main", "sha": "b"},
            "merged": false, "mergeable": true, "labels": null, "user": null
        });
        let pr: GiteaPullRequest = serde_json::from_value(raw).unwrap();
        assert!(pr.labels.is_empty());
        assert!(pr.mergeable);
    }
}
