use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{COOKIE, REFERER};
use reqwest::{Client, RequestBuilder, Response};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

use super::types::{CourseContext, CourseInfo, CourseUnits, UnitInfo, UserInfo};
use super::{PortalClient, PortalError, PortalResult};
use crate::session::Credentials;

/// Text present on the profile page only for a logged-in session
pub const PROFILE_MARKER: &str = "我的资料";

const USER_INFO_PATH: &str = "/user/userinfo.aspx";
const COURSE_LIST_PATH: &str = "/ajax/authCourse.aspx";
const COURSE_PAGE_PATH: &str = "/student/course_info.aspx";
const STUDY_STAT_PATH: &str = "/ajax/StudyStat.aspx";
const STUDENT_INDEX_PATH: &str = "/student/index.aspx";

#[derive(Debug, Deserialize)]
struct CourseListPayload {
    clist: Vec<CourseInfo>,
}

#[derive(Debug, Deserialize)]
struct UnitListPayload {
    info: Vec<UnitInfo>,
}

/// `PortalClient` over HTTP, sending the session cookies with every request
pub struct HttpPortal {
    client: Client,
    base_url: String,
}

impl HttpPortal {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> PortalResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("course-runner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str, credentials: &Credentials) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .header(COOKIE, credentials.header_value())
    }

    async fn send(request: RequestBuilder) -> PortalResult<Response> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(PortalError::Status(response.status().as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl PortalClient for HttpPortal {
    async fn validate(&self, credentials: &Credentials) -> PortalResult<bool> {
        let response = self.get(USER_INFO_PATH, credentials).send().await?;
        let body = response.text().await?;
        let valid = body.contains(PROFILE_MARKER);
        debug!(valid, "cookie validation");
        Ok(valid)
    }

    async fn user_info(&self, credentials: &Credentials) -> PortalResult<UserInfo> {
        let response = Self::send(self.get(USER_INFO_PATH, credentials)).await?;
        let html = response.text().await?;
        parse_user_info(&html)
    }

    async fn courses(&self, credentials: &Credentials) -> PortalResult<Vec<CourseInfo>> {
        let nocache = format!("{:.16}", rand::random::<f64>());
        let request = self
            .get(COURSE_LIST_PATH, credentials)
            .query(&[("action", "gmc"), ("nocache", nocache.as_str())])
            .header(REFERER, self.url(STUDENT_INDEX_PATH));

        let payload: CourseListPayload = Self::send(request)
            .await?
            .json()
            .await
            .map_err(|e| PortalError::Parse(format!("course list: {}", e)))?;

        trace!(count = payload.clist.len(), "courses received");
        Ok(payload.clist)
    }

    async fn lessons(&self, credentials: &Credentials, cid: &str) -> PortalResult<CourseUnits> {
        let referer = self.url(COURSE_PAGE_PATH);

        let page = Self::send(
            self.get(COURSE_PAGE_PATH, credentials)
                .query(&[("cid", cid)])
                .header(REFERER, referer.as_str()),
        )
        .await?
        .text()
        .await?;
        let context = parse_course_context(cid, &page)?;

        let payload: UnitListPayload = Self::send(
            self.get(STUDY_STAT_PATH, credentials)
                .query(&[
                    ("action", "courseunits"),
                    ("cid", cid),
                    ("uid", context.uid.as_str()),
                ])
                .header(REFERER, referer.as_str()),
        )
        .await?
        .json()
        .await
        .map_err(|e| PortalError::Parse(format!("unit list: {}", e)))?;

        Ok(CourseUnits {
            context,
            units: payload.info,
        })
    }
}

fn selector(css: &str) -> PortalResult<Selector> {
    Selector::parse(css).map_err(|e| PortalError::Parse(format!("invalid selector {}: {:?}", css, e)))
}

/// Extract the profile fields from the `div#user1` panel of the profile page
pub fn parse_user_info(html: &str) -> PortalResult<UserInfo> {
    let document = Html::parse_document(html);
    let panel_sel = selector("div#user1")?;
    let panel = document
        .select(&panel_sel)
        .next()
        .ok_or_else(|| PortalError::Parse("user info panel not found".to_string()))?;

    Ok(UserInfo {
        username: input_value(panel, "lblAccount")?,
        name: input_value(panel, "txtName")?,
        student_id: input_value(panel, "txtStuNo")?,
        school: selected_school(panel)?,
        birth_year: selected_option(panel, "ddlYear")?,
    })
}

fn input_value(panel: ElementRef<'_>, id_fragment: &str) -> PortalResult<Option<String>> {
    let sel = selector(&format!("input[id*='{}']", id_fragment))?;
    Ok(panel
        .select(&sel)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string))
}

fn selected_option(panel: ElementRef<'_>, id_fragment: &str) -> PortalResult<Option<String>> {
    let sel = selector(&format!("select[id*='{}'] option[selected]", id_fragment))?;
    Ok(panel
        .select(&sel)
        .next()
        .and_then(|option| option.value().attr("value"))
        .map(str::to_string))
}

// The school picker is sometimes rendered as a bootstrap multiselect button
fn selected_school(panel: ElementRef<'_>) -> PortalResult<Option<String>> {
    if let Some(school) = selected_option(panel, "txtSchool")? {
        return Ok(Some(school));
    }
    let sel = selector("button.multiselect")?;
    Ok(panel
        .select(&sel)
        .next()
        .and_then(|button| button.value().attr("title"))
        .filter(|title| !title.is_empty())
        .map(str::to_string))
}

/// Pull `uid` and `classid` out of the scripts embedded in a course page
pub fn parse_course_context(cid: &str, page: &str) -> PortalResult<CourseContext> {
    let uid_re = Regex::new(r#""uid":(.*?),"#)
        .map_err(|e| PortalError::Parse(format!("uid pattern: {}", e)))?;
    let classid_re = Regex::new(r#""classid":"(.*?)""#)
        .map_err(|e| PortalError::Parse(format!("classid pattern: {}", e)))?;

    let uid = uid_re
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().trim_matches('"').to_string())
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| PortalError::Parse("uid not found on course page".to_string()))?;
    let classid = classid_re
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| PortalError::Parse("classid not found on course page".to_string()))?;

    Ok(CourseContext {
        cid: cid.to_string(),
        uid,
        classid,
    })
}
