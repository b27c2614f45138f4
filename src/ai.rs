use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::env;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Offers below this confidence are discarded.
pub const MIN_OFFER_CONFIDENCE: f64 = 60.0;

const EMAIL_BODY_LIMIT: usize = 5000;

// --- Provider trait ---

pub trait AIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
    ClaudeCode,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

fn spec(provider: ProviderKind, model_id: &str, short_name: &str) -> ModelSpec {
    ModelSpec {
        provider,
        model_id: model_id.to_string(),
        short_name: short_name.to_string(),
    }
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    match name {
        // Local `claude` CLI, no API key needed
        "claude-sonnet" | "sonnet" => Ok(spec(ProviderKind::ClaudeCode, "claude-sonnet-4-5-20250929", "claude-sonnet")),
        "claude-opus" | "opus" => Ok(spec(ProviderKind::ClaudeCode, "claude-opus-4-6", "claude-opus")),
        "claude-haiku" | "haiku" => Ok(spec(ProviderKind::ClaudeCode, "claude-haiku-4-5-20251001", "claude-haiku")),
        // Anthropic API (ANTHROPIC_API_KEY)
        "api-sonnet" => Ok(spec(ProviderKind::Anthropic, "claude-sonnet-4-5-20250929", "api-sonnet")),
        "api-opus" => Ok(spec(ProviderKind::Anthropic, "claude-opus-4-6", "api-opus")),
        "api-haiku" => Ok(spec(ProviderKind::Anthropic, "claude-haiku-4-5-20251001", "api-haiku")),
        // OpenAI (OPENAI_API_KEY)
        "gpt-5.2" | "gpt5" => Ok(spec(ProviderKind::OpenAI, "gpt-5.2", "gpt-5.2")),
        "gpt-4o" => Ok(spec(ProviderKind::OpenAI, "gpt-4o", "gpt-4o")),
        "gpt-4o-mini" => Ok(spec(ProviderKind::OpenAI, "gpt-4o-mini", "gpt-4o-mini")),
        _ => Err(anyhow!(
            "Unknown model '{}'. Available: claude-sonnet (default), claude-opus, claude-haiku, \
             api-sonnet, api-opus, api-haiku, gpt-5.2, gpt-4o, gpt-4o-mini",
            name
        )),
    }
}

pub fn create_provider(spec: &ModelSpec) -> Result<Box<dyn AIProvider>> {
    match spec.provider {
        ProviderKind::ClaudeCode => Ok(Box::new(ClaudeCodeProvider::new(spec.model_id.clone())?)),
        ProviderKind::Anthropic => Ok(Box::new(AnthropicProvider::new(spec.model_id.clone())?)),
        ProviderKind::OpenAI => Ok(Box::new(OpenAIProvider::new(spec.model_id.clone())?)),
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

impl ChatRequest {
    fn user(model: &str, prompt: &str, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        }
    }
}

fn http_client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .context("Failed to build HTTP client")
}

fn read_success(response: reqwest::blocking::Response, api: &str) -> Result<reqwest::blocking::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().unwrap_or_default();
    Err(anyhow!("{} API request failed with status {}: {}", api, status, error_text))
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set. Set it with: export ANTHROPIC_API_KEY=your-key-here")?;
        Ok(Self { api_key, model_id, client: http_client()? })
    }
}

impl AIProvider for AnthropicProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&ChatRequest::user(&self.model_id, prompt, max_tokens))
            .send()
            .context("Failed to send request to Anthropic API")?;

        let api_response: AnthropicResponse = read_success(response, "Anthropic")?
            .json()
            .context("Failed to parse Anthropic API response")?;

        api_response
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| anyhow!("No content in Anthropic API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Claude Code provider (shells out to `claude` CLI) ---

#[derive(Debug)]
pub struct ClaudeCodeProvider {
    model_id: String,
}

impl ClaudeCodeProvider {
    pub fn new(model_id: String) -> Result<Self> {
        std::process::Command::new("claude")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .context("'claude' CLI not found. Install it or use --model api-sonnet/gpt-4o instead.")?;
        Ok(Self { model_id })
    }
}

impl AIProvider for ClaudeCodeProvider {
    fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        let output = std::process::Command::new("claude")
            .arg("-p")
            .arg(prompt)
            .arg("--model")
            .arg(&self.model_id)
            .output()
            .context("Failed to run 'claude' CLI")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("claude CLI failed: {}", stderr));
        }

        let response = String::from_utf8(output.stdout).context("Invalid UTF-8 in claude CLI output")?;
        if response.trim().is_empty() {
            return Err(anyhow!("Empty response from claude CLI"));
        }
        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set. Set it with: export OPENAI_API_KEY=your-key-here")?;
        Ok(Self { api_key, model_id, client: http_client()? })
    }
}

impl AIProvider for OpenAIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&ChatRequest::user(&self.model_id, prompt, max_tokens))
            .send()
            .context("Failed to send request to OpenAI API")?;

        let api_response: OpenAIResponse = read_success(response, "OpenAI")?
            .json()
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Response cache ---

/// Completed responses keyed by model and prompt. Entries older than the TTL
/// are dropped on lookup.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: RefCell<HashMap<String, (Instant, String)>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RefCell::new(HashMap::new()) }
    }

    fn key(model: &str, prompt: &str) -> String {
        format!("{}:{}", model, prompt)
    }

    pub fn get(&self, model: &str, prompt: &str) -> Option<String> {
        let key = Self::key(model, prompt);
        let mut entries = self.entries.borrow_mut();
        match entries.get(&key) {
            Some((stored_at, response)) if stored_at.elapsed() < self.ttl => Some(response.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, model: &str, prompt: &str, response: String) {
        self.entries
            .borrow_mut()
            .insert(Self::key(model, prompt), (Instant::now(), response));
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

// --- Response schemas ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvMatch {
    pub score: f64,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAnalysis {
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    #[serde(default)]
    pub experience_level: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    pub salary_range: Option<String>,
    #[serde(default)]
    pub work_type: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyResearch {
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub culture: Vec<String>,
    #[serde(default)]
    pub key_facts: Vec<String>,
    #[serde(default)]
    pub interview_tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailVerdict {
    is_job_offer: bool,
    #[serde(default)]
    company: String,
    #[serde(default)]
    job_title: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    salary: String,
    #[serde(default)]
    job_description: String,
    #[serde(default)]
    job_url: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

/// A job opportunity found in an email.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailOffer {
    pub company: String,
    pub job_title: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub job_description: String,
    pub job_url: Option<String>,
    pub confidence: f64,
}

/// What the model is told about an email.
#[derive(Debug, Clone, Copy)]
pub struct EmailContent<'a> {
    pub subject: &'a str,
    pub from: &'a str,
    pub date: &'a str,
    pub body: &'a str,
}

// --- Client ---

pub struct AiClient {
    provider: Box<dyn AIProvider>,
    cache: ResponseCache,
}

impl AiClient {
    pub fn new(provider: Box<dyn AIProvider>, cache: ResponseCache) -> Self {
        Self { provider, cache }
    }

    pub fn from_model(name: &str, cache_ttl: Duration) -> Result<Self> {
        let spec = resolve_model(name)?;
        info!(model = %spec.short_name, "using AI model");
        Ok(Self::new(create_provider(&spec)?, ResponseCache::new(cache_ttl)))
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    fn generate(&self, prompt: &str, max_tokens: u32, use_cache: bool) -> Result<String> {
        let model = self.provider.model_name();
        if use_cache {
            if let Some(hit) = self.cache.get(model, prompt) {
                debug!(model, "using cached AI response");
                return Ok(hit);
            }
        }

        let response = self.provider.complete(prompt, max_tokens)?;
        if use_cache {
            self.cache.put(model, prompt, response.clone());
        }
        Ok(response)
    }

    pub fn match_cv(&self, cv_text: &str, job_description: &str) -> Result<CvMatch> {
        let prompt = format!(
            "You are an expert recruiter. Compare the CV against the job description.\n\n\
            JOB DESCRIPTION:\n{job_description}\n\n\
            CV CONTENT:\n{cv_text}\n\n\
            Respond ONLY with valid JSON, no markdown, in this format:\n\
            {{\n  \"score\": <number 0-100>,\n  \"strengths\": [\"...\"],\n  \"gaps\": [\"...\"],\n  \
            \"recommendations\": [\"...\"],\n  \"summary\": \"<2-3 sentence overall assessment>\"\n}}\n\n\
            Consider technical skills, experience level, soft skills, industry relevance, \
            education and years of experience."
        );
        let response = self.generate(&prompt, 4096, true)?;
        parse_json(&response).context("Invalid CV match response")
    }

    pub fn cover_letter(
        &self,
        cv_text: &str,
        job_description: &str,
        company: &str,
        job_title: &str,
        additional_info: Option<&str>,
    ) -> Result<String> {
        let extra = additional_info
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("ADDITIONAL CONTEXT:\n{}\n\n", s))
            .unwrap_or_default();
        let prompt = format!(
            "You are an expert career coach. Write a compelling, professional cover letter.\n\n\
            JOB DETAILS:\n- Company: {company}\n- Position: {job_title}\n\n\
            JOB DESCRIPTION:\n{job_description}\n\n\
            CANDIDATE'S CV:\n{cv_text}\n\n\
            {extra}\
            The letter should be enthusiastic but professional, use specific examples from the CV, \
            address the key requirements, and stay between 300 and 400 words. \
            Do NOT include placeholder text like [Your Address] or [Date]."
        );
        // Always fresh
        let letter = self.generate(&prompt, 2048, false)?;
        Ok(letter.trim().to_string())
    }

    pub fn analyze_job_description(&self, job_description: &str) -> Result<JobAnalysis> {
        let prompt = format!(
            "Analyze this job description.\n\n\
            JOB DESCRIPTION:\n{job_description}\n\n\
            Respond ONLY with valid JSON, no markdown, in this format:\n\
            {{\n  \"requiredSkills\": [\"...\"],\n  \"preferredSkills\": [\"...\"],\n  \
            \"experienceLevel\": \"<entry/mid/senior/lead>\",\n  \"responsibilities\": [\"...\"],\n  \
            \"qualifications\": [\"...\"],\n  \"salaryRange\": \"<if mentioned, otherwise null>\",\n  \
            \"workType\": \"<remote/hybrid/onsite/not specified>\",\n  \"summary\": \"<2-3 sentences>\"\n}}"
        );
        let response = self.generate(&prompt, 4096, true)?;
        parse_json(&response).context("Invalid job analysis response")
    }

    pub fn research_company(&self, company: &str, context: Option<&str>) -> Result<CompanyResearch> {
        let context = context
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("ADDITIONAL CONTEXT: {}\n", s))
            .unwrap_or_default();
        let prompt = format!(
            "Research this company for a job applicant.\n\n\
            COMPANY NAME: {company}\n{context}\n\
            Respond ONLY with valid JSON, no markdown, in this format:\n\
            {{\n  \"overview\": \"<2-3 sentences>\",\n  \"industry\": \"...\",\n  \
            \"size\": \"<startup/small/medium/large/enterprise>\",\n  \"culture\": [\"...\"],\n  \
            \"keyFacts\": [\"...\"],\n  \"interviewTips\": [\"...\"]\n}}"
        );
        let response = self.generate(&prompt, 4096, true)?;
        parse_json(&response).context("Invalid company research response")
    }

    /// `None` when the model says the email holds no opportunity, is less
    /// than [`MIN_OFFER_CONFIDENCE`] sure, or gives no job title.
    pub fn extract_email_offer(&self, email: &EmailContent<'_>) -> Result<Option<EmailOffer>> {
        let body: String = strip_html(email.body).chars().take(EMAIL_BODY_LIMIT).collect();
        let prompt = format!(
            "Analyze this email and determine if it contains a job offer or job opportunity.\n\n\
            Email:\n---\nSubject: {}\nFrom: {}\nDate: {}\n\n{}\n---\n\n\
            If it does, respond with:\n\
            {{\"isJobOffer\": true, \"company\": \"...\", \"jobTitle\": \"...\", \"location\": \"\", \
            \"salary\": \"\", \"jobDescription\": \"<max 500 characters>\", \"jobUrl\": \"\", \
            \"confidence\": 85, \"reasoning\": \"...\"}}\n\
            If it does not, respond with:\n\
            {{\"isJobOffer\": false, \"confidence\": 90, \"reasoning\": \"...\"}}\n\n\
            Job alerts listing specific openings count as offers. Career advice and marketing \
            emails without specific positions do not.\n\
            Respond ONLY with valid JSON, no additional text.",
            email.subject, email.from, email.date, body
        );
        let response = self.generate(&prompt, 1024, false)?;
        let verdict: EmailVerdict = parse_json(&response).context("Failed to parse email verdict")?;

        if !verdict.is_job_offer {
            debug!(subject = email.subject, reason = %verdict.reasoning, "email is not a job offer");
            return Ok(None);
        }
        if verdict.confidence < MIN_OFFER_CONFIDENCE {
            debug!(subject = email.subject, confidence = verdict.confidence, "email offer below confidence threshold");
            return Ok(None);
        }
        if verdict.job_title.trim().is_empty() {
            debug!(subject = email.subject, "email offer has no job title");
            return Ok(None);
        }

        let company = match verdict.company.trim() {
            "" => company_from_sender(email.from),
            name => name.to_string(),
        };

        Ok(Some(EmailOffer {
            company,
            job_title: verdict.job_title.trim().to_string(),
            location: non_empty(verdict.location),
            salary: non_empty(verdict.salary),
            job_description: verdict.job_description,
            job_url: non_empty(verdict.job_url),
            confidence: verdict.confidence,
        }))
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// The outermost `{...}` span of a model response.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_json<T: DeserializeOwned>(response: &str) -> Result<T> {
    let json = extract_json(response).ok_or_else(|| anyhow!("Invalid AI response format: no JSON object found"))?;
    serde_json::from_str(json).context("AI response JSON did not match the expected structure")
}

fn strip_html(body: &str) -> String {
    let tags = Regex::new(r"<[^>]*>").ok();
    let text = match tags {
        Some(re) => re.replace_all(body, " ").into_owned(),
        None => body.to_string(),
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "LinkedIn Jobs <jobs@linkedin.com>" => "LinkedIn"
pub fn company_from_sender(from: &str) -> String {
    if let Some((name, _)) = from.split_once('<') {
        let name = name.trim().trim_matches('"').trim();
        if !name.is_empty() {
            let stripped = name
                .strip_suffix("Jobs")
                .or_else(|| name.strip_suffix("Job"))
                .unwrap_or(name)
                .trim();
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }

    if let Some((_, domain)) = from.split_once('@') {
        let label = domain.split('.').next().unwrap_or("").trim_matches('>');
        let mut chars = label.chars();
        if let Some(first) = chars.next() {
            return first.to_uppercase().chain(chars).collect();
        }
    }

    "Unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;

    /// Hands out canned responses in order and counts calls.
    struct ScriptedProvider {
        responses: RefCell<VecDeque<String>>,
        calls: std::rc::Rc<Cell<usize>>,
    }

    fn client(responses: &[&str], ttl: Duration) -> (AiClient, std::rc::Rc<Cell<usize>>) {
        let calls = std::rc::Rc::new(Cell::new(0));
        let provider = ScriptedProvider {
            responses: RefCell::new(responses.iter().map(|s| s.to_string()).collect()),
            calls: calls.clone(),
        };
        (AiClient::new(Box::new(provider), ResponseCache::new(ttl)), calls)
    }

    impl AIProvider for ScriptedProvider {
        fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow!("script exhausted"))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    const MATCH_JSON: &str = r#"Here you go:
```json
{"score": 82, "strengths": ["Rust"], "gaps": ["Go"], "recommendations": ["Mention tokio"], "summary": "Strong fit."}
```"#;

    #[test]
    fn test_resolve_model_claude_code() {
        let spec = resolve_model("claude-sonnet").unwrap();
        assert_eq!(spec.model_id, "claude-sonnet-4-5-20250929");
        assert!(matches!(spec.provider, ProviderKind::ClaudeCode));

        let spec = resolve_model("sonnet").unwrap();
        assert_eq!(spec.short_name, "claude-sonnet");

        let spec = resolve_model("haiku").unwrap();
        assert!(matches!(spec.provider, ProviderKind::ClaudeCode));
    }

    #[test]
    fn test_resolve_model_api_providers() {
        assert!(matches!(resolve_model("api-opus").unwrap().provider, ProviderKind::Anthropic));
        assert!(matches!(resolve_model("gpt-4o").unwrap().provider, ProviderKind::OpenAI));
        assert_eq!(resolve_model("gpt5").unwrap().short_name, "gpt-5.2");
    }

    #[test]
    fn test_resolve_model_unknown() {
        let err = resolve_model("gemini-flash").unwrap_err();
        assert!(err.to_string().contains("Unknown model"));
    }

    #[test]
    fn test_anthropic_provider_requires_api_key() {
        let original = env::var("ANTHROPIC_API_KEY").ok();
        unsafe { env::remove_var("ANTHROPIC_API_KEY"); }

        let result = AnthropicProvider::new("claude-sonnet-4-5-20250929".to_string());

        if let Some(val) = original {
            unsafe { env::set_var("ANTHROPIC_API_KEY", val); }
        }

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let original = env::var("OPENAI_API_KEY").ok();
        unsafe { env::remove_var("OPENAI_API_KEY"); }

        let result = OpenAIProvider::new("gpt-4o".to_string());

        if let Some(val) = original {
            unsafe { env::set_var("OPENAI_API_KEY", val); }
        }

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_extract_json_takes_outermost_object() {
        assert_eq!(extract_json(r#"noise {"a": {"b": 1}} trailing"#), Some(r#"{"a": {"b": 1}}"#));
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_match_cv_parses_fenced_json() {
        let (ai, _) = client(&[MATCH_JSON], Duration::from_secs(60));
        let result = ai.match_cv("cv", "job").unwrap();
        assert_eq!(result.score, 82.0);
        assert_eq!(result.strengths, vec!["Rust"]);
        assert_eq!(result.summary, "Strong fit.");
    }

    #[test]
    fn test_match_cv_rejects_wrong_shape() {
        let (ai, _) = client(&[r#"{"score": "high"}"#], Duration::from_secs(60));
        assert!(ai.match_cv("cv", "job").is_err());

        let (ai, _) = client(&["I cannot help with that."], Duration::from_secs(60));
        let err = ai.match_cv("cv", "job").unwrap_err();
        assert!(format!("{:#}", err).contains("no JSON object"));
    }

    #[test]
    fn test_repeated_prompt_is_served_from_cache() {
        let (ai, calls) = client(&[MATCH_JSON], Duration::from_secs(60));
        let first = ai.match_cv("cv", "job").unwrap();
        let second = ai.match_cv("cv", "job").unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(ai.cache().len(), 1);
    }

    #[test]
    fn test_expired_entry_is_refetched() {
        let (ai, calls) = client(&[MATCH_JSON, MATCH_JSON], Duration::ZERO);
        ai.match_cv("cv", "job").unwrap();
        ai.match_cv("cv", "job").unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_cover_letter_is_never_cached() {
        let (ai, calls) = client(&["  Dear team,\n\nHello.  ", "Dear team, again."], Duration::from_secs(60));
        let letter = ai.cover_letter("cv", "job", "Acme", "Engineer", None).unwrap();
        assert_eq!(letter, "Dear team,\n\nHello.");
        ai.cover_letter("cv", "job", "Acme", "Engineer", None).unwrap();
        assert_eq!(calls.get(), 2);
        assert!(ai.cache().is_empty());
    }

    #[test]
    fn test_analyze_job_description_reads_camel_case() {
        let (ai, _) = client(
            &[r#"{"requiredSkills": ["Rust"], "preferredSkills": [], "experienceLevel": "senior",
                "responsibilities": ["Ship"], "qualifications": [], "salaryRange": null,
                "workType": "remote", "summary": "Build things."}"#],
            Duration::from_secs(60),
        );
        let analysis = ai.analyze_job_description("job").unwrap();
        assert_eq!(analysis.required_skills, vec!["Rust"]);
        assert_eq!(analysis.experience_level, "senior");
        assert_eq!(analysis.salary_range, None);
        assert_eq!(analysis.work_type, "remote");
    }

    #[test]
    fn test_research_company() {
        let (ai, _) = client(
            &[r#"{"overview": "Makes rockets.", "industry": "Aerospace", "size": "large",
                "culture": ["fast"], "keyFacts": ["Founded 2002"], "interviewTips": ["Know orbits"]}"#],
            Duration::from_secs(60),
        );
        let research = ai.research_company("Acme", Some("Space")).unwrap();
        assert_eq!(research.industry, "Aerospace");
        assert_eq!(research.key_facts, vec!["Founded 2002"]);
        assert_eq!(research.interview_tips, vec!["Know orbits"]);
    }

    fn email<'a>(from: &'a str) -> EmailContent<'a> {
        EmailContent {
            subject: "New role",
            from,
            date: "Mon, 6 Jan 2025 09:00:00 +0000",
            body: "<p>We are hiring</p>",
        }
    }

    #[test]
    fn test_extract_email_offer_accepts_confident_offer() {
        let (ai, _) = client(
            &[r#"{"isJobOffer": true, "company": "", "jobTitle": "Backend Engineer", "location": "Berlin",
                "salary": "", "jobDescription": "APIs", "jobUrl": "https://jobs.example.com/1",
                "confidence": 85, "reasoning": "specific opening"}"#],
            Duration::from_secs(60),
        );
        let offer = ai.extract_email_offer(&email("Acme Jobs <jobs@acme.io>")).unwrap().unwrap();
        assert_eq!(offer.company, "Acme");
        assert_eq!(offer.job_title, "Backend Engineer");
        assert_eq!(offer.location.as_deref(), Some("Berlin"));
        assert_eq!(offer.salary, None);
        assert_eq!(offer.job_url.as_deref(), Some("https://jobs.example.com/1"));
    }

    #[test]
    fn test_extract_email_offer_rejects_low_confidence_and_non_offers() {
        let (ai, _) = client(
            &[
                r#"{"isJobOffer": true, "company": "Acme", "jobTitle": "Engineer", "confidence": 59}"#,
                r#"{"isJobOffer": false, "confidence": 95, "reasoning": "newsletter"}"#,
            ],
            Duration::from_secs(60),
        );
        assert_eq!(ai.extract_email_offer(&email("a@b.com")).unwrap(), None);
        assert_eq!(ai.extract_email_offer(&email("a@b.com")).unwrap(), None);
    }

    #[test]
    fn test_company_from_sender() {
        assert_eq!(company_from_sender("LinkedIn Jobs <jobs@linkedin.com>"), "LinkedIn");
        assert_eq!(company_from_sender("\"Stripe\" <talent@stripe.com>"), "Stripe");
        assert_eq!(company_from_sender("careers@globex.com"), "Globex");
        assert_eq!(company_from_sender("nobody"), "Unknown");
    }

    #[test]
    fn test_strip_html_collapses_whitespace() {
        assert_eq!(strip_html("<p>Hello</p>\n\n<b>world</b>"), "Hello world");
    }
}
