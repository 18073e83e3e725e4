// Built-in prompt text for the optimize pipeline.
// The optimization and cover-letter templates mirror the files shipped in
// `prompts/` and are used whenever those files cannot be read or filled.

/// Template file names, resolved against `PROMPT_TEMPLATE_DIR`.
pub const OPTIMIZATION_TEMPLATE_FILE: &str = "cv-optimization-shared.txt";
pub const COVER_LETTER_TEMPLATE_FILE: &str = "cover-letter.txt";

/// Placeholders every optimization template must contain.
pub const OPTIMIZATION_PLACEHOLDERS: &[&str] = &["cvText", "jobDescription", "structuredData"];

/// Placeholders every cover-letter template must contain.
pub const COVER_LETTER_PLACEHOLDERS: &[&str] = &[
    "cvText",
    "jobDescription",
    "coverLetterStyle",
    "tone",
    "focusAreas",
    "hiringManager",
    "companyName",
    "jobSource",
    "useTemplate",
];

/// Fallback CV optimization template.
/// Replace `{cvText}`, `{jobDescription}` and `{structuredData}` before sending.
pub const OPTIMIZATION_FALLBACK_TEMPLATE: &str = r#"You are an expert CV and job description analyst. Analyze the CV and job description below and produce a concrete, line-by-line optimization plan that improves ATS (Applicant Tracking System) compatibility and job match.

---
CV CONTENT (verbatim):
Each line below is a separate bullet or paragraph. Do NOT merge lines. Do NOT split lines. Do NOT reorder lines.
{cvText}

---
JOB DESCRIPTION (verbatim):
{jobDescription}

---
ADDITIONAL STRUCTURED DATA:
{structuredData}

---
INSTRUCTIONS:
1. Each suggested edit replaces exactly ONE line of the CV. "originalBullet" must be copied character for character from a single CV line.
2. Only suggest a replacement when it is a concrete improvement in keyword match, clarity or impact. If a line is already optimal, do not include it.
3. NEVER invent experience, employers, dates, metrics or skills that are not present in the CV.
4. NEVER suggest generic placeholders such as "add specific technologies", "list your skills" or "etc.".
5. List the job description keywords that are missing or underrepresented in the CV, with a concrete suggestion for each.
6. Give an overall match score from 0 to 100 and predict the score if all missing keywords were added.
7. Extract the job details (company, location, salary, contract length, job type, other).
8. Identify yourself in the "model" field.

---
RESPONSE FORMAT (a single JSON object, no text outside it):
{
  "model": "your model name",
  "matchScore": 72,
  "keywords": ["keyword1", "keyword2"],
  "keywordSuggestions": [
    { "keyword": "keyword1", "suggestion": "Where and how to add it" }
  ],
  "improvements": ["improvement1", "improvement2"],
  "suggestedEdits": [
    {
      "section": "Summary | Key Skills | Experience | ...",
      "originalBullet": "Exact CV line",
      "improvedBullet": "Concrete replacement for that line",
      "reason": "Why this change helps"
    }
  ],
  "overallRecommendations": ["Recommendation 1", "Recommendation 2"],
  "predictedMatchScoreIfKeywordsAdded": 85,
  "jobDetails": {
    "company": "",
    "location": "",
    "salary": "",
    "contractLength": "",
    "jobType": "",
    "other": ""
  }
}
"#;

/// Fallback cover-letter template.
pub const COVER_LETTER_FALLBACK_TEMPLATE: &str = r#"You are an expert cover letter writer. Write a compelling, professional cover letter based on the CV and job description below.

CV CONTENT:
{cvText}

JOB DESCRIPTION:
{jobDescription}

PREFERENCES:
- Style: {coverLetterStyle}
- Tone: {tone}
- Focus areas: {focusAreas}
- Hiring manager: {hiringManager}
- Company: {companyName}
- Where the job was found: {jobSource}
- Follow a standard letter template: {useTemplate}

REQUIREMENTS:
- Address the hiring manager by name when one is given, otherwise "Dear Hiring Manager".
- Highlight experience from the CV that matches the key requirements. Do NOT invent experience.
- Two to three paragraphs, formal business language, ending with a call to action and a professional closing.

Return only the cover letter text.
"#;

/// Job description analysis prompt. Replace `{jobDescription}` before sending.
pub const JOB_ANALYSIS_PROMPT: &str = r#"You are an expert HR analyst. Analyze the following job description and extract key information.

Job Description:
{jobDescription}

Respond with a single JSON object with this structure:
{
  "keywords": ["keyword1", "keyword2", "keyword3"],
  "skills": ["skill1", "skill2", "skill3"],
  "requirements": ["requirement1", "requirement2"],
  "industry": "industry name",
  "level": "entry | mid | senior | executive",
  "summary": "Brief summary of the role"
}

Focus on technical skills, soft skills, experience requirements, industry terms and the action verbs ATS systems look for.
Return only the JSON object, no additional text.
"#;

/// Short prompt used by the settings screen to check a provider answers.
pub const TEST_MODEL_PROMPT: &str =
    "Reply with the single word OK followed by the name of the model you are.";
