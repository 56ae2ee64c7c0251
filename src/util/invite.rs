use twilight_model::guild::Permissions;
use twilight_model::id::marker::ApplicationMarker;
use twilight_model::id::Id;

/// The permissions requested by the bot's default invite link.
pub const PERMISSIONS: Permissions = Permissions::VIEW_CHANNEL
    .union(Permissions::SEND_MESSAGES)
    .union(Permissions::READ_MESSAGE_HISTORY)
    .union(Permissions::MENTION_EVERYONE);

/// Returns an OAuth authorization link that invites the given application with the given
/// permissions.
#[must_use]
pub fn invite(application_id: Id<ApplicationMarker>, permissions: Permissions) -> String {
    let bits = permissions.bits();

    format!("https://discord.com/api/oauth2/authorize?client_id={application_id}&scope=bot&permissions={bits}")
}

#[cfg(test)]
mod tests {
    use twilight_model::guild::Permissions;
    use twilight_model::id::Id;

    #[test]
    fn link_contains_client_and_permissions() {
        let link = super::invite(Id::new(42), Permissions::SEND_MESSAGES | Permissions::VIEW_CHANNEL);

        assert_eq!(
            link,
            "https://discord.com/api/oauth2/authorize?client_id=42&scope=bot&permissions=3072"
        );
    }
}
