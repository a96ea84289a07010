pub const PAYMENT_REQUIRED_FIELDS: [&str; 6] = [
    "scholarshipId",
    "transactionId",
    "userName",
    "userEmail",
    "postedUserEmail",
    "applicationFees",
];

pub const PAYMENT_INTENT_REQUIRED_FIELDS: [&str; 2] = ["applicationFees", "scholarshipId"];
