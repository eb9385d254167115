//! Search section: modalities and techniques to draw on.

use std::fmt::Write as _;

use crate::psvs::config::quadrant_profile;
use crate::psvs::{EnergyState, PsvsPosition, Quadrant};

fn modalities(quadrant: Quadrant) -> &'static [&'static str] {
    match quadrant {
        Quadrant::Expert => &[
            "Cognitive Behavioral Therapy (CBT) - logical, structured",
            "Rational Emotive Behavior Therapy (REBT)",
            "Solution-Focused Brief Therapy",
            "Psychoeducation and skill-building",
        ],
        Quadrant::Supporter => &[
            "Person-Centered Therapy (Rogers)",
            "Compassion-Focused Therapy",
            "Acceptance and Commitment Therapy (ACT)",
            "Relational therapy approaches",
        ],
        Quadrant::Leader => &[
            "Solution-Focused Brief Therapy",
            "Motivational Interviewing",
            "Goal-oriented approaches",
            "Strategic therapy",
        ],
        Quadrant::Dreamer => &[
            "Narrative Therapy",
            "Existential Therapy",
            "Creative therapies",
            "Motivational Interviewing",
        ],
    }
}

fn techniques(energy: EnergyState) -> &'static [&'static str] {
    match energy {
        EnergyState::Positive => &[
            "Maintenance strategies",
            "Relapse prevention",
            "Growth and development focus",
            "Deepening self-awareness",
        ],
        EnergyState::Negative => &[
            "Stress reduction techniques",
            "Boundary-setting skills",
            "Agency-building exercises",
            "Cognitive restructuring",
            "Emotion regulation",
        ],
        EnergyState::Neurotic => &[
            "Safety assessment and planning",
            "De-escalation techniques",
            "Grounding exercises",
            "Immediate coping strategies",
            "Referral considerations if needed",
        ],
    }
}

const MOVEMENT_STRATEGIES: &str = "
### Movement Strategies (移动策略)

**From Neurotic → Negative:**
- Reduce hostility (H) and extremity (E)
- Build boundaries (B)
- Introduce small moments of agency (A)

**From Negative → Positive:**
- Strengthen agency (A) and boundaries (B)
- Reduce withdrawal (W)
- Build sustainable coping mechanisms

**Maintaining Positive:**
- Continue validating healthy patterns
- Prevent regression through skill reinforcement
- Build resilience for future challenges
";

/// Render the search section for a position.
pub fn render_search(position: &PsvsPosition) -> String {
    let quadrant = position.quadrant();
    let energy = position.energy_state();

    let mut out = String::from(
        "## Therapeutic Knowledge Search (知识检索)\n\n\
         ### Recommended Therapeutic Approaches\n\n",
    );

    let _ = writeln!(out, "**For {} Quadrant:**", quadrant.as_str().to_uppercase());
    for m in modalities(quadrant) {
        let _ = writeln!(out, "- {}", m);
    }

    let _ = write!(
        out,
        "\n### Techniques for {} State\n\n",
        energy.as_str().to_uppercase()
    );
    if energy == EnergyState::Neurotic {
        let _ = writeln!(
            out,
            "- **CRISIS INTERVENTION** for {}",
            quadrant_profile(quadrant).neurotic_pattern
        );
    }
    for t in techniques(energy) {
        let _ = writeln!(out, "- {}", t);
    }

    out.push_str(MOVEMENT_STRATEGIES);
    out
}
