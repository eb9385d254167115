//! Policy section: how to interact with the client right now.

use std::fmt::Write as _;

use crate::psvs::config::{energy_zone, quadrant_profile};
use crate::psvs::{EnergyState, PsvsPosition, Quadrant};

const POSITIVE_APPROACH: &str = "### Therapeutic Approach (POSITIVE State)
- **Maintain**: Continue supportive dialogue, reinforce healthy patterns
- **Validate**: Acknowledge their balanced state and progress
- **Build**: Strengthen coping mechanisms for future challenges
- **Explore**: Deeper self-understanding and growth opportunities

### What to Avoid
- Don't introduce unnecessary stress or challenge too aggressively
- Avoid disrupting their current stability
";

const NEGATIVE_APPROACH: &str = "### Therapeutic Approach (NEGATIVE State)
- **Stabilize**: Focus on reducing stress and building agency
- **Boundaries**: Help establish clear boundaries and respectful communication
- **Agency**: Encourage action-oriented thinking and responsibility-taking
- **Validate**: Acknowledge their struggles without reinforcing avoidance

### What to Avoid
- Don't be overly directive or controlling
- Avoid enabling withdrawal or avoidance patterns
- Don't minimize their experience
";

const NEUROTIC_APPROACH: &str = "- **Safety First**: Assess immediate safety and crisis needs
- **De-escalate**: Reduce hostility, extremity, and withdrawal
- **Boundaries**: Firmly but compassionately establish therapeutic boundaries
- **Agency**: Help client find small areas of control and choice
- **Respect**: Deeply validate their pain while guiding toward stability

### Critical Interventions Needed
";

/// Hard constraints, only rendered in crisis.
const NEUROTIC_NEVER: &str = "
### What to Avoid
- **Never**: Match their hostility or extremity
- **Never**: Enable neurotic patterns
- **Never**: Abandon therapeutic boundaries
";

fn crisis_interventions(quadrant: Quadrant) -> &'static str {
    match quadrant {
        Quadrant::Expert => {
            "- Address procrastination and decision paralysis\n\
             - Build momentum through small, achievable tasks\n"
        }
        Quadrant::Supporter => {
            "- Address self-neglect and people-pleasing\n\
             - Rebuild self-worth and boundaries\n"
        }
        Quadrant::Leader => {
            "- Address controlling and coercive patterns\n\
             - Build collaborative problem-solving\n"
        }
        Quadrant::Dreamer => {
            "- Address narcissistic patterns and boundary violations\n\
             - Build genuine empathy and perspective-taking\n"
        }
    }
}

fn quadrant_guidance(quadrant: Quadrant) -> &'static str {
    match quadrant {
        Quadrant::Expert => {
            "- Respect their need for data and logical reasoning\n\
             - Provide clear explanations and rationale\n\
             - Help them move from analysis to action\n\
             - Address tendency to overthink and delay decisions\n"
        }
        Quadrant::Supporter => {
            "- Validate their relational focus and empathy\n\
             - Help them balance others' needs with self-care\n\
             - Address people-pleasing and self-erasing patterns\n\
             - Build healthy assertiveness\n"
        }
        Quadrant::Leader => {
            "- Acknowledge their need for control and results\n\
             - Channel decisiveness into collaborative leadership\n\
             - Address domineering and my-way-or-highway patterns\n\
             - Build flexibility and openness to input\n"
        }
        Quadrant::Dreamer => {
            "- Validate their creativity and vision\n\
             - Help them balance inspiration with grounding\n\
             - Address attention-seeking and narcissistic patterns\n\
             - Build genuine connection and boundaries\n"
        }
    }
}

/// Render the policy section for a position.
pub fn render_policy(position: &PsvsPosition) -> String {
    let quadrant = position.quadrant();
    let energy = position.energy_state();
    let profile = quadrant_profile(quadrant);
    let zone = energy_zone(energy);

    let mut out = String::with_capacity(2048);
    let _ = write!(
        out,
        "## Therapeutic Policy (动态策略)\n\n\
         ### Client Current State\n\
         - **Personality Quadrant**: {}\n\
         - **Energy State**: {} ({})\n\
         - **Distance from Center**: {:.2} (0=balanced, 1=crisis)\n\n\
         ### Core Strengths to Leverage\n{}\n\n\
         ### Current Challenges\n{}\n\n",
        profile.name,
        zone.zone,
        zone.color,
        position.distance_from_center(),
        profile.strengths.join(", "),
        profile.challenges.join(", "),
    );

    match energy {
        EnergyState::Positive => out.push_str(POSITIVE_APPROACH),
        EnergyState::Negative => out.push_str(NEGATIVE_APPROACH),
        EnergyState::Neurotic => {
            let _ = write!(
                out,
                "### Therapeutic Approach (NEUROTIC State) - URGENT\n\
                 **Warning**: Client is in {} zone\n\n",
                profile.neurotic_pattern
            );
            out.push_str(NEUROTIC_APPROACH);
            out.push_str(crisis_interventions(quadrant));
            out.push_str(NEUROTIC_NEVER);
        }
    }

    let _ = write!(
        out,
        "\n### Quadrant-Specific Guidance ({})\n",
        quadrant.as_str().to_uppercase()
    );
    out.push_str(quadrant_guidance(quadrant));
    out
}
