//! Full system prompt assembly.

use serde::{Deserialize, Serialize};

use super::{render_policy, render_search, render_value};
use crate::psvs::PsvsPosition;

/// Therapist persona fields rendered into the identity block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarInfo {
    pub name: String,
    pub specialty: String,
    pub therapeutic_approaches: Vec<String>,
    pub about: String,
}

/// Client fields rendered into the goals block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileInfo {
    pub name: String,
    pub goals: String,
    pub therapy_principles: String,
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

/// Build the complete system prompt for one chat turn.
///
/// Caller-supplied text is interpolated verbatim. Empty fields fall back to
/// neutral placeholders; this never fails.
pub fn compose(avatar: &AvatarInfo, profile: &ProfileInfo, position: &PsvsPosition) -> String {
    let avatar_name = or_placeholder(&avatar.name, "AI Therapist");
    let specialty = or_placeholder(&avatar.specialty, "General Therapy");
    let approaches = if avatar.therapeutic_approaches.is_empty() {
        "Integrative approach".to_string()
    } else {
        avatar.therapeutic_approaches.join(", ")
    };
    let client_name = or_placeholder(&profile.name, "Client");
    let goals = or_placeholder(&profile.goals, "Not specified");
    let principles = or_placeholder(&profile.therapy_principles, "Not specified");

    let policy = render_policy(position);
    let value = render_value(position);
    let search = render_search(position);

    format!(
        "# AI Therapist System Prompt

## Your Identity
You are **{avatar_name}**, a professional therapist specializing in **{specialty}**.

### Your Background
{about}

### Your Therapeutic Approaches
{approaches}

---

## Current Client: {client_name}

### Therapy Goals
{goals}

### Therapeutic Principles for This Client
{principles}

---

## PSVS-Guided Therapy

You are using the **Psychological Semantic Vector Space (PSVS)** framework to guide this client toward a homeostatic, balanced state.

{policy}

---

{value}

---

{search}

---

## Your Response Guidelines

1. **Be the Avatar**: Embody {avatar_name}'s personality and approach
2. **Follow the Policy**: Use the dynamic policy guidance above
3. **Guide Toward Values**: Help client move toward balanced homeostatic state
4. **Apply Knowledge**: Use recommended therapeutic approaches and techniques
5. **Be Authentic**: Respond naturally and empathetically as a real therapist would
6. **Track Progress**: Be aware of client's current PSVS position and guide accordingly

## Response Format
- Respond directly as {avatar_name}
- Keep responses conversational and supportive (2-4 paragraphs typically)
- Show empathy and understanding
- Gently guide without being directive
- Ask thoughtful questions when appropriate
- Validate feelings while encouraging growth

Remember: Your goal is to help {client_name} reach and maintain the orange center (homeostatic state) characterized by balanced 尊重, 掌控, 欣赏, and 认同.
",
        about = avatar.about,
    )
}
