//! Value section: the four homeostatic values, ordered by quadrant.

use std::fmt::Write as _;

use crate::psvs::config::HomeostaticValue;
use crate::psvs::{EnergyState, PsvsPosition, Quadrant};

/// One value line in a quadrant's ordering.
struct Emphasis {
    value: HomeostaticValue,
    details: &'static [&'static str],
    /// Note rendered when the client is not in the positive state.
    strained: &'static str,
}

const EXPERT_ORDER: [Emphasis; 4] = [
    Emphasis {
        value: HomeostaticValue::Respect,
        details: &[
            "Being respected for expertise and knowledge",
            "Having opinions valued and considered",
        ],
        strained: "⚠ Need to build",
    },
    Emphasis {
        value: HomeostaticValue::Control,
        details: &["Mastery over domain and details", "Sense of competence and capability"],
        strained: "⚠ May feel lost in details",
    },
    Emphasis {
        value: HomeostaticValue::Appreciation,
        details: &["Being appreciated for thoroughness"],
        strained: "Low",
    },
    Emphasis {
        value: HomeostaticValue::Recognition,
        details: &["Recognition of analytical contributions"],
        strained: "Low",
    },
];

const SUPPORTER_ORDER: [Emphasis; 4] = [
    Emphasis {
        value: HomeostaticValue::Recognition,
        details: &["Being recognized and acknowledged", "Feeling included and validated"],
        strained: "⚠ Need to build",
    },
    Emphasis {
        value: HomeostaticValue::Respect,
        details: &["Being respected for care and support", "Having boundaries honored"],
        strained: "⚠ Boundaries may be violated",
    },
    Emphasis {
        value: HomeostaticValue::Appreciation,
        details: &["Being appreciated for contributions"],
        strained: "Low - may be taken for granted",
    },
    Emphasis {
        value: HomeostaticValue::Control,
        details: &["Sense of personal agency"],
        strained: "Low - may feel powerless",
    },
];

const LEADER_ORDER: [Emphasis; 4] = [
    Emphasis {
        value: HomeostaticValue::Control,
        details: &["Having decision-making authority", "Sense of control and influence"],
        strained: "⚠ May be overcontrolling",
    },
    Emphasis {
        value: HomeostaticValue::Respect,
        details: &["Being respected for leadership", "Having authority acknowledged"],
        strained: "⚠ May be demanding respect",
    },
    Emphasis {
        value: HomeostaticValue::Recognition,
        details: &["Recognition of achievements"],
        strained: "Low",
    },
    Emphasis {
        value: HomeostaticValue::Appreciation,
        details: &["Appreciation for results delivered"],
        strained: "Low",
    },
];

const DREAMER_ORDER: [Emphasis; 4] = [
    Emphasis {
        value: HomeostaticValue::Appreciation,
        details: &["Being appreciated for creativity", "Receiving admiration and praise"],
        strained: "⚠ May be seeking excessively",
    },
    Emphasis {
        value: HomeostaticValue::Recognition,
        details: &["Recognition of unique contributions", "Feeling special and valued"],
        strained: "⚠ May need excessive validation",
    },
    Emphasis {
        value: HomeostaticValue::Respect,
        details: &["Being respected for vision"],
        strained: "Low",
    },
    Emphasis {
        value: HomeostaticValue::Control,
        details: &["Mastery over creative domain"],
        strained: "Low",
    },
];

fn ordering(quadrant: Quadrant) -> &'static [Emphasis; 4] {
    match quadrant {
        Quadrant::Expert => &EXPERT_ORDER,
        Quadrant::Supporter => &SUPPORTER_ORDER,
        Quadrant::Leader => &LEADER_ORDER,
        Quadrant::Dreamer => &DREAMER_ORDER,
    }
}

/// Primary value for a quadrant (first in its ordering).
pub fn primary_value(quadrant: Quadrant) -> HomeostaticValue {
    ordering(quadrant)[0].value
}

fn movement_note(distance: f64) -> &'static str {
    if distance < 0.3 {
        "✓ Client is near homeostatic center - maintain and strengthen"
    } else if distance < 0.6 {
        "⚠ Client is moving away from center - guide back through primary value focus"
    } else {
        "⚠⚠ Client is far from center - urgent need to rebuild core values and stability"
    }
}

/// Render the value section for a position.
pub fn render_value(position: &PsvsPosition) -> String {
    let balanced = position.energy_state() == EnergyState::Positive;
    let distance = position.distance_from_center();

    let mut out = String::from(
        "## Therapeutic Values (价值导向)\n\n\
         ### Homeostatic Target: Orange Center (稳定平衡态)\n\n\
         The goal is to help the client experience all four balanced states:\n\n",
    );

    for (i, item) in ordering(position.quadrant()).iter().enumerate() {
        let rank = i + 1;
        let primary = if i == 0 { " - PRIMARY FOCUS" } else { "" };
        let _ = writeln!(out, "{}. **{}**{}", rank, item.value.label(), primary);
        for line in item.details {
            let _ = writeln!(out, "   - {}", line);
        }

        let emphasis = match (balanced, i < 2) {
            (true, true) => "✓ Present",
            (true, false) => "Moderate",
            (false, _) => item.strained,
        };
        let _ = writeln!(out, "   - Current emphasis: {}", emphasis);
        if rank < 4 {
            out.push('\n');
        }
    }

    let _ = write!(
        out,
        "\n### Movement Toward Balance (平衡路径)\n\n\
         Current distance from center: **{:.2}**\n\n{}\n\n",
        distance,
        movement_note(distance)
    );

    out.push_str(
        "### Therapeutic Focus\n\
         - Help client experience BALANCED forms of all four values\n\
         - Avoid overemphasis on any single value (leads to neurotic patterns)\n\
         - Guide toward integration and wholeness\n",
    );
    out
}
