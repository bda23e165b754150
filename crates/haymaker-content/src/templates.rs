//! Canned per-department email scenarios, used whenever the backend can't be.

use std::sync::atomic::{AtomicUsize, Ordering};

use haymaker_core::{Department, EmailContent};

type Template = (&'static str, &'static str);

const ENGINEERING: &[Template] = &[
    (
        "Sprint Update",
        "Hi team,\n\nJust a quick update on the current sprint. We're on track with the planned deliverables.\n\nBest,\n{worker}",
    ),
    (
        "Code Review Request",
        "Hi,\n\nCould you take a look at my latest PR when you get a chance? It addresses the performance issue we discussed.\n\nThanks,\n{worker}",
    ),
    (
        "Design Decision: Caching Layer",
        "Hi all,\n\nAfter yesterday's discussion we'll go with the read-through cache. I'll write up the details in the design doc.\n\nCheers,\n{worker}",
    ),
];

const SALES: &[Template] = &[
    (
        "Client Follow-up",
        "Hi team,\n\nFollowing up on today's client call. They're interested in moving forward with the proposal.\n\nBest,\n{worker}",
    ),
    (
        "Pipeline Update",
        "Hi,\n\nQuick update on the Q4 pipeline - we're tracking well against targets.\n\nRegards,\n{worker}",
    ),
    (
        "Demo Prep for Thursday",
        "Hi,\n\nCan we sync tomorrow to prepare the product demo for Thursday? I'd like to walk through the new pricing slides.\n\nThanks,\n{worker}",
    ),
];

const HR: &[Template] = &[
    (
        "Updated Leave Policy",
        "Hi everyone,\n\nThe updated leave policy is now on the intranet. Please review it before the end of the month.\n\nBest,\n{worker}",
    ),
    (
        "New Starter Onboarding",
        "Hi,\n\nWe have two new starters joining the {department} team on Monday. Could you make sure their accounts are ready?\n\nThanks,\n{worker}",
    ),
];

const FINANCE: &[Template] = &[
    (
        "Budget Review Reminder",
        "Hi all,\n\nA reminder that departmental budget reviews are due Friday. Let me know if you need the template.\n\nRegards,\n{worker}",
    ),
    (
        "Expense Report Approval",
        "Hi,\n\nI've approved the pending expense reports. Two need receipts before they can be reimbursed.\n\nThanks,\n{worker}",
    ),
];

const OPERATIONS: &[Template] = &[
    (
        "Vendor Coordination",
        "Hi team,\n\nThe vendor confirmed the delivery window for next week. I'll share the updated schedule shortly.\n\nBest,\n{worker}",
    ),
    (
        "Process Improvement Proposal",
        "Hi,\n\nI've drafted a proposal to simplify the intake process. Would appreciate your feedback before Wednesday.\n\nThanks,\n{worker}",
    ),
];

const EXECUTIVE: &[Template] = &[
    (
        "Board Preparation",
        "Hi all,\n\nPlease send your slides for the board pack by Thursday so we can review them together.\n\nThanks,\n{worker}",
    ),
    (
        "Strategic Priorities",
        "Hi team,\n\nSharing a short summary of our priorities for the next quarter. Happy to discuss at the all-hands.\n\nBest,\n{worker}",
    ),
];

fn templates_for(department: Department) -> &'static [Template] {
    match department {
        Department::Engineering => ENGINEERING,
        Department::Sales => SALES,
        Department::Hr => HR,
        Department::Finance => FINANCE,
        Department::Operations => OPERATIONS,
        Department::Executive => EXECUTIVE,
    }
}

/// Deterministic template rotation. Shared counter across departments.
#[derive(Debug, Default)]
pub struct TemplateSource {
    counter: AtomicUsize,
}

impl TemplateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next template for `department`, placeholders filled in.
    pub fn next(&self, department: Department, worker_name: &str) -> EmailContent {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let list = templates_for(department);
        let (subject, body) = list[n % list.len()];
        EmailContent {
            subject: fill(subject, department, worker_name),
            body: fill(body, department, worker_name),
        }
    }
}

fn fill(text: &str, department: Department, worker_name: &str) -> String {
    text.replace("{worker}", worker_name)
        .replace("{department}", department.as_str())
}
