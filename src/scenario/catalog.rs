//! Built-in scenario texts.

use super::Scenario;
use crate::game::{GameType, Move};

fn scenario(name: &str, game_type: GameType, description: &str, options: [(&str, Move); 2]) -> Scenario {
    Scenario {
        name: name.to_string(),
        game_type,
        description: description.to_string(),
        options: options.iter().map(|(label, _)| label.to_string()).collect(),
        move_mapping: options
            .iter()
            .map(|(label, mv)| (label.to_string(), *mv))
            .collect(),
    }
}

pub(super) fn builtin_scenarios() -> Vec<Scenario> {
    use GameType::*;

    vec![
        // Prisoner's dilemma
        scenario(
            "Price Competition",
            PrisonersDilemma,
            "You and a competitor are the only two firms selling a popular product in your market. \
             You're both considering whether to maintain current prices or cut prices to gain market share. \
             If you both maintain prices, you'll both enjoy healthy profits. \
             If one cuts prices while the other maintains, the price-cutter gains significant market share. \
             If you both cut prices, you'll end up in a price war with reduced profits for both.",
            [("maintain prices", Move::Cooperate), ("cut prices", Move::Defect)],
        ),
        scenario(
            "R&D Information Sharing",
            PrisonersDilemma,
            "Your company and another firm are working on similar technologies. \
             You could share research findings to accelerate progress for both, or keep your research secret. \
             Mutual sharing would benefit both companies through faster innovation. \
             If one shares while the other doesn't, the non-sharer gets a competitive advantage. \
             If neither shares, progress is slower for both.",
            [("share research", Move::Cooperate), ("keep secret", Move::Defect)],
        ),
        scenario(
            "Supplier Contract Negotiation",
            PrisonersDilemma,
            "You're negotiating a long-term contract with a key supplier who also supplies your competitor. \
             You can offer fair terms that ensure stable supply for both companies, \
             or you can try to lock in exclusive terms that disadvantage your competitor. \
             If both offer fair terms, the supplier maintains good relationships with both. \
             If one tries for exclusivity while the other doesn't, they might secure an advantage. \
             If both push for exclusivity, the supplier may raise prices for both or seek other customers.",
            [("fair terms", Move::Cooperate), ("exclusive terms", Move::Defect)],
        ),
        // Stag hunt
        scenario(
            "Joint Venture Investment",
            StagHunt,
            "You and another company are considering a joint venture that requires significant investment from both parties. \
             You can commit to the full investment for the joint venture, which will only succeed if both invest fully. \
             Alternatively, you can pursue a smaller independent project that guarantees modest returns regardless of their decision. \
             The joint venture would yield excellent returns if both commit, but if only one invests fully, they lose their investment. \
             The independent project is safe but offers much lower returns.",
            [("joint venture", Move::Stag), ("independent project", Move::Hare)],
        ),
        scenario(
            "Industry Standard Development",
            StagHunt,
            "Your company and a competitor are deciding whether to collaborate on developing a new industry standard. \
             Full collaboration would create a superior standard benefiting both companies greatly. \
             However, this requires significant resource commitment and trust. \
             Alternatively, you could develop your own proprietary solution, which is guaranteed to work but offers limited market potential. \
             If only one company commits to the standard while the other develops independently, the committing company wastes resources.",
            [("develop standard together", Move::Stag), ("proprietary solution", Move::Hare)],
        ),
        scenario(
            "Market Expansion Strategy",
            StagHunt,
            "Two companies are considering whether to jointly enter an expensive new international market. \
             Joint entry would allow cost-sharing and greater market impact, yielding high returns if both commit. \
             Each could instead focus on expanding in their current domestic market with guaranteed moderate growth. \
             Solo entry into the international market would be too costly and likely fail. \
             The domestic expansion is safer but limits growth potential.",
            [("international partnership", Move::Stag), ("domestic expansion", Move::Hare)],
        ),
        // Hawk-dove
        scenario(
            "Patent Dispute",
            HawkDove,
            "Your company and another firm both claim rights to a valuable patent. \
             You can aggressively pursue litigation to secure exclusive rights, \
             or you can propose a licensing agreement to share the technology. \
             If one pursues litigation while the other seeks agreement, the aggressive party likely wins exclusive rights. \
             If both litigate aggressively, you'll both incur massive legal costs with uncertain outcomes. \
             If both seek agreement, you can quickly establish a mutually beneficial licensing deal.",
            [("aggressive litigation", Move::Hawk), ("seek agreement", Move::Dove)],
        ),
        scenario(
            "Market Territory Conflict",
            HawkDove,
            "Your company and a competitor are both eyeing the same lucrative geographic market. \
             You can aggressively expand into the territory with heavy marketing and pricing strategies, \
             or you can propose dividing the territory or finding alternative markets. \
             If one expands aggressively while the other yields, the aggressive company dominates the market. \
             If both expand aggressively, you'll face a costly market war hurting both companies' profits. \
             If both seek alternatives, you can both find profitable opportunities without conflict.",
            [("aggressive expansion", Move::Hawk), ("seek alternatives", Move::Dove)],
        ),
        scenario(
            "Talent Acquisition Battle",
            HawkDove,
            "Both your company and a competitor are trying to hire the same team of talented engineers. \
             You can make an aggressive offer well above market rate to secure them, \
             or you can make a reasonable offer and focus on your company's other advantages. \
             If one company makes an aggressive offer while the other doesn't, they get the team. \
             If both make aggressive offers, you'll start a bidding war that inflates salaries industry-wide. \
             If both make reasonable offers, the team chooses based on other factors, and salary inflation is avoided.",
            [("aggressive offer", Move::Hawk), ("reasonable offer", Move::Dove)],
        ),
        // Coordination
        scenario(
            "Technology Platform Choice",
            Coordination,
            "Your company and a key partner need to choose a technology platform for a joint project. \
             There are two equally good options: Platform A and Platform B. \
             The critical factor is that you both choose the same platform for compatibility. \
             If you choose different platforms, the project will face serious integration challenges. \
             Both platforms are equally capable, so the key is coordination.",
            [("Platform A", Move::OptionA), ("Platform B", Move::OptionB)],
        ),
        scenario(
            "Meeting Scheduling System",
            Coordination,
            "Your division and another need to adopt a scheduling system for inter-departmental meetings. \
             Two systems are available: System Alpha (morning-optimized) and System Beta (afternoon-optimized). \
             Both systems work well, but they're incompatible with each other. \
             If both divisions choose the same system, scheduling is seamless. \
             If you choose different systems, coordination becomes very difficult.",
            [("System Alpha", Move::OptionA), ("System Beta", Move::OptionB)],
        ),
        scenario(
            "Trade Show Participation",
            Coordination,
            "Your company and a complementary business are deciding which major trade show to attend this year. \
             There are two equally prestigious shows: the Spring Expo and the Fall Summit. \
             Attending the same show would allow valuable collaboration and joint presentations. \
             Attending different shows means missing these synergy opportunities. \
             Both shows offer similar visibility and networking benefits.",
            [("Spring Expo", Move::OptionA), ("Fall Summit", Move::OptionB)],
        ),
    ]
}
