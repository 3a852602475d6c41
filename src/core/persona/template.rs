use super::PersonaConfig;

/// Number of topics mentioned in the instructions
const SUMMARY_TOPICS: usize = 5;

const GENERIC_TOPICS: &str = "Consider general MBA topics during the conversation: career goals, \
leadership experience, teamwork, and why this program.";

const INSTRUCTION_TEMPLATE: &str = r#"You are an expert MBA admissions interviewer conducting a natural, conversational interview.

PERSONA: {persona_context}

SCHOOL CONTEXT: {school_context}

TONE: {tone}

BEHAVIORAL GUIDELINES: {behavioral_notes}

CONVERSATION FLOW:
1. Start with this greeting: "{greeting}"
2. Ask thoughtful follow-up questions based on candidate responses
3. Explore leadership experiences, analytical thinking, and cultural fit
4. Maintain natural conversation flow - don't follow a rigid script
5. End with: "{closing}"

EVALUATION CRITERIA:
- Communication Skills (25%) - clarity, articulation, engagement
- Leadership Potential (25%) - examples of leadership and influence
- Analytical Thinking (25%) - problem-solving and strategic reasoning
- Cultural Fit (25%) - alignment with school values and community

CONVERSATION GUIDELINES:
- Ask one question at a time
- Listen actively to responses
- Ask relevant follow-ups based on what the candidate shares
- Keep the interview natural and conversational
- Be professional yet warm and supportive
- Use the take_interview_notes tool to record key observations

QUESTION BANK CONTEXT: {questions_context}

NOTE: This is a LIVE AUDIO conversation. Respond naturally as if speaking to the candidate in person.
"#;

/// Summary of the first few topics, or a generic one when there are none.
pub fn topic_summary(topics: &[String]) -> String {
    let picked: Vec<&str> = topics
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .take(SUMMARY_TOPICS)
        .collect();

    if picked.is_empty() {
        GENERIC_TOPICS.to_string()
    } else {
        format!(
            "Consider these school-specific topics during the conversation: {}",
            picked.join("; ")
        )
    }
}

/// Compose the interviewer instructions for `persona`.
///
/// Empty fields fall back to the default persona so the output never
/// contains an unresolved marker.
pub fn compose_instructions(persona: &PersonaConfig) -> String {
    let defaults = PersonaConfig::default_persona();
    let pick = |value: &str, fallback: &str| {
        let value = value.trim();
        if value.is_empty() {
            fallback.to_string()
        } else {
            value.to_string()
        }
    };

    let persona_context = format!(
        "You are {} - {}",
        pick(&persona.interviewer_name, &defaults.interviewer_name),
        pick(&persona.interviewer_title, &defaults.interviewer_title)
    );

    let replacements = [
        ("{persona_context}", persona_context),
        (
            "{school_context}",
            pick(&persona.school_context, &defaults.school_context),
        ),
        ("{tone}", pick(&persona.tone, &defaults.tone)),
        (
            "{behavioral_notes}",
            pick(&persona.behavioral_notes, &defaults.behavioral_notes),
        ),
        ("{greeting}", pick(&persona.greeting, &defaults.greeting)),
        ("{closing}", pick(&persona.closing, &defaults.closing)),
        ("{questions_context}", topic_summary(&persona.topics)),
    ];

    // Single pass so placeholder-like text inside values is left alone
    let mut output = String::with_capacity(INSTRUCTION_TEMPLATE.len() + 512);
    let mut rest = INSTRUCTION_TEMPLATE;
    while let Some(start) = rest.find('{') {
        output.push_str(&rest[..start]);
        let tail = &rest[start..];
        match replacements
            .iter()
            .find(|(marker, _)| tail.starts_with(marker))
        {
            Some((marker, value)) => {
                output.push_str(value);
                rest = &tail[marker.len()..];
            }
            None => {
                output.push('{');
                rest = &tail[1..];
            }
        }
    }
    output.push_str(rest);
    output
}
