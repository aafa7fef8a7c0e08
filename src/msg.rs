//! User-visible message catalog.
//!
//! Replies are catalogued by key. Format strings use `$b` to toggle
//! bold, `$C`/`$O`/`$N` for the channel/oper/nick service bot names, and
//! printf-style `%s`/`%d`/`%u`/`%i` substitution filled left to right.

use std::fmt::Display;

/// Bot names substituted for `$C`/`$O`/`$N`.
#[derive(Debug, Clone, Default)]
pub struct BotNames {
    pub chanserv: String,
    pub opserv: String,
    pub nickserv: String,
}

/// Expand one format string against positional arguments.
pub fn expand(fmt: &str, args: &[&dyn Display], names: &BotNames) -> String {
    let mut out = String::with_capacity(fmt.len() + 16);
    let mut next_arg = 0;
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '%' => match chars.next() {
                Some('s') | Some('d') | Some('u') | Some('i') | Some('c') => {
                    if let Some(arg) = args.get(next_arg) {
                        out.push_str(&arg.to_string());
                    }
                    next_arg += 1;
                }
                Some('%') => out.push('%'),
                Some(other) => {
                    out.push('%');
                    out.push(other);
                }
                None => out.push('%'),
            },
            '$' => match chars.next() {
                Some('b') => out.push('\x02'),
                Some('C') => out.push_str(&names.chanserv),
                Some('O') => out.push_str(&names.opserv),
                Some('N') => out.push_str(&names.nickserv),
                Some('$') => out.push('$'),
                Some(other) => {
                    out.push('$');
                    out.push(other);
                }
                None => out.push('$'),
            },
            c => out.push(c),
        }
    }
    out
}

/// Look up a catalog entry. Unknown keys fall back to the key itself so
/// a missing entry is visible rather than silent.
pub fn text_for(key: &str) -> &str {
    for (k, text) in CATALOG {
        if *k == key {
            return text;
        }
    }
    key
}

/// Render `key` with `args`.
pub fn render(key: &str, args: &[&dyn Display], names: &BotNames) -> String {
    expand(text_for(key), args, names)
}

static CATALOG: &[(&str, &str)] = &[
    // Channel registration
    ("CSMSG_REG_SUCCESS", "You now have ownership of $b%s$b."),
    ("CSMSG_PROXY_SUCCESS", "%s now has ownership of $b%s$b."),
    ("CSMSG_ALREADY_REGGED", "$b%s$b is registered to someone else."),
    ("CSMSG_MUST_BE_OPPED", "You must be a channel operator in $b%s$b to register it."),
    ("CSMSG_OWN_TOO_MANY", "%s already owns enough channels (at least %d); use FORCE to override."),
    // Do-not-register
    ("CSMSG_NOT_DNR", "$b%s$b is not a valid channel name or *account."),
    ("CSMSG_DNR_SEARCH_RESULTS", "The following do-not-registers were found:"),
    ("CSMSG_DNR_INFO_SET", "$b%s$b is do-not-register (set %s by $b%s$b): %s"),
    ("CSMSG_DNR_CHANNEL", "Only network staff may register $b%s$b."),
    ("CSMSG_DNR_CHANNEL_MOVE", "Only network staff may move $b%s$b."),
    ("CSMSG_DNR_ACCOUNT", "Only network staff may register channels to $b%s$b."),
    ("CSMSG_NOREGISTER_CHANNEL", "$b%s$b has been added to the do-not-register list."),
    ("CSMSG_NO_SUCH_DNR", "$b%s$b is not in the do-not-register list."),
    ("CSMSG_DNR_REMOVED", "$b%s$b has been removed from the do-not-register list."),
    // Unregistration, move, merge
    ("CSMSG_UNREG_SUCCESS", "$b%s$b has been unregistered."),
    ("CSMSG_UNREG_NODELETE", "$b%s$b is protected from unregistration."),
    ("CSMSG_CHAN_SUSPENDED", "$b$C$b access to $b%s$b has been temporarily suspended (%s)."),
    ("CSMSG_CONFIRM_UNREG", "To confirm this unregistration, you must use 'unregister %s'."),
    ("CSMSG_MOVE_SUCCESS", "Channel registration has been moved to $b%s$b."),
    ("CSMSG_MOVE_NODELETE", "$b%s$b is protected from unregistration, and cannot be moved."),
    ("CSMSG_MERGE_SUCCESS", "Channel successfully merged into $b%s$b."),
    ("CSMSG_MERGE_SELF", "Merging cannot be performed if the source and target channels are the same."),
    ("CSMSG_MERGE_NODELETE", "You may not merge a channel that is marked NoDelete."),
    ("CSMSG_MERGE_SUSPENDED", "Merging cannot be performed if the source or target channel is suspended."),
    ("CSMSG_MERGE_NOT_OWNER", "You must be the owner of the target channel (or a helper) to merge into the channel."),
    // Errors
    ("CSMSG_NOT_USER", "You lack access to $b%s$b."),
    ("CSMSG_NO_CHAN_USER", "%s lacks access to $b%s$b."),
    ("CSMSG_NO_ACCESS", "You lack sufficient access to use this command."),
    ("CSMSG_NOT_REGISTERED", "$b%s$b has not been registered with $b$C$b."),
    ("CSMSG_MAXIMUM_BANS", "This channel has reached the ban count limit of $b%d$b."),
    ("CSMSG_MAXIMUM_USERS", "This channel has reached the user count limit of $b%d$b."),
    ("CSMSG_ILLEGAL_CHANNEL", "$b%s$b is an illegal channel, and cannot be registered."),
    // Self-removal
    ("CSMSG_NO_OWNER_DELETEME", "You cannot delete your owner access in $b%s$b."),
    ("CSMSG_CONFIRM_DELETEME", "To really remove yourself, you must use 'deleteme %s'."),
    ("CSMSG_DELETED_YOU", "Your $b%d$b access has been deleted from $b%s$b."),
    // User management
    ("CSMSG_ADDED_USER", "Added %s to the %s user list with access %d."),
    ("CSMSG_DELETED_USER", "Deleted %s (with access %d) from the %s user list."),
    ("CSMSG_BAD_RANGE", "Invalid access range; minimum (%d) must be greater than maximum (%d)."),
    ("CSMSG_DELETED_USERS", "Deleted accounts matching $b%s$b with access from $b%d$b to $b%d$b from the %s user list."),
    ("CSMSG_TRIMMED_USERS", "Trimmed $b%d users$b with access from %d to %d from the %s user list who were inactive for at least %s."),
    ("CSMSG_INCORRECT_ACCESS", "%s has access $b%d$b, not %s."),
    ("CSMSG_USER_EXISTS", "%s is already on the $b%s$b user list (with access %d)."),
    ("CSMSG_CANNOT_TRIM", "You must include a minimum inactivity duration of at least 60 seconds to trim."),
    ("CSMSG_NO_SELF_CLVL", "You cannot change your own access."),
    ("CSMSG_NO_BUMP_ACCESS", "You cannot give users access greater than or equal to your own."),
    ("CSMSG_MULTIPLE_OWNERS", "There is more than one owner in %s; please use $bCLVL$b, $bDELOWNER$b and/or $bADDOWNER$b instead."),
    ("CSMSG_TRANSFER_WAIT", "You must wait %s before you can give ownership of $b%s$b to someone else."),
    ("CSMSG_NO_TRANSFER_SELF", "You cannot give ownership to your own account."),
    ("CSMSG_CONFIRM_GIVEOWNERSHIP", "To really give ownership to $b%s$b, you must use 'giveownership *%s %s'."),
    ("CSMSG_OWNERSHIP_GIVEN", "Ownership of $b%s$b has been transferred to account $b%s$b."),
    ("CSMSG_INVALID_ACCESS", "$b%s$b is an invalid access level."),
    ("CSMSG_CHANGED_ACCESS", "%s now has access $b%d$b in %s."),
    ("CSMSG_ACCESS_ALL_HEADER", "%s users from level %d to %d:"),
    ("CSMSG_USERS_ROW", "%d (%s) %s %s"),
    ("CSMSG_INVALID_TRIM", "$b%s$b isn't a valid trim target."),
    ("CSMSG_USET_NOAUTOOP", "$bNoAutoOp    $b %s"),
    ("CSMSG_USET_AUTOINVITE", "$bAutoInvite  $b %s"),
    ("CSMSG_USET_INFO", "$bInfo        $b %s"),
    // Ban management
    ("CSMSG_BAN_ADDED", "Permanently banned $b%s$b from %s."),
    ("CSMSG_TIMED_BAN_ADDED", "Banned $b%s$b from %s for %s."),
    ("CSMSG_BAN_DONE", "Banned $b%s$b from %s."),
    ("CSMSG_KICK_BAN_DONE", "Kickbanned $b%s$b from %s."),
    ("CSMSG_REASON_CHANGE", "Reason for ban $b%s$b changed."),
    ("CSMSG_BAN_EXTENDED", "Extended ban for $b%s$b expires in %s."),
    ("CSMSG_BAN_REMOVED", "Matching ban(s) for $b%s$b removed."),
    ("CSMSG_REDUNDANT_BAN", "$b%s$b is already banned in %s."),
    ("CSMSG_DURATION_TOO_LOW", "Timed bans must last for at least 15 seconds."),
    ("CSMSG_DURATION_TOO_HIGH", "Timed bans must last for less than 2 years."),
    ("CSMSG_LAME_MASK", "$b%s$b is a little too general. Try making it more specific."),
    ("CSMSG_MASK_PROTECTED", "Sorry, ban for $b%s$b conflicts with a protected user's hostmask."),
    ("CSMSG_BAN_NOT_FOUND", "Sorry, no ban found for $b%s$b."),
    ("CSMSG_BANLIST_FULL", "The $b%s$b channel ban list is $bfull$b."),
    ("CSMSG_NO_BANS", "No channel bans found on $b%s$b."),
    ("CSMSG_BANS_ROW", "%s (set by %s; expires %s)"),
    // Topic / modes
    ("CSMSG_TOPIC_SET", "Topic is now '%s'."),
    ("CSMSG_NO_TOPIC", "$b%s$b does not have a default topic."),
    ("CSMSG_TOPIC_LOCKED", "The %s topic is locked."),
    ("CSMSG_MODES_SET", "Channel modes are now $b%s$b."),
    ("CSMSG_NO_MODES", "$b%s$b does not have any default modes."),
    ("CSMSG_DEFAULTED_MODES", "Channel modes for $b%s$b are set to their defaults."),
    ("CSMSG_INVALID_MODE_LOCK", "$b%s$b is an invalid mode lock."),
    ("CSMSG_MODE_LOCKED", "Modes conflicting with $b%s$b are not allowed in %s."),
    ("CSMSG_CANNOT_SET", "That setting is above your current level, so you cannot change it."),
    ("CSMSG_OWNER_DEFAULTS", "You must have access 500 in %s to reset it to the default options."),
    ("CSMSG_CONFIRM_DEFAULTS", "To reset %s's settings to the defaults, you must use 'set defaults %s'."),
    ("CSMSG_SETTINGS_DEFAULTED", "All settings for %s have been reset to default values."),
    ("CSMSG_BAD_SETLEVEL", "You cannot change any setting to above your level."),
    ("CSMSG_BAD_GIVEVOICE", "You cannot change GiveVoice to above GiveOps (%d)."),
    ("CSMSG_BAD_GIVEOPS", "You cannot change GiveOps to below GiveVoice (%d)."),
    ("CSMSG_INVALID_NUMERIC", "$b%d$b is not a valid choice.  Choose one:"),
    ("CSMSG_CHOICE_ROW", "$b%d$b: %s"),
    ("CSMSG_GREETING_TOO_LONG", "Your greeting ($b%d$b characters) may not exceed $b%d$b characters."),
    ("CSMSG_SET_DEFAULT_TOPIC", "$bDefaultTopic$b %s"),
    ("CSMSG_SET_TOPICMASK", "$bTopicMask   $b %s"),
    ("CSMSG_SET_GREETING", "$bGreeting    $b %s"),
    ("CSMSG_SET_USERGREETING", "$bUserGreeting$b %s"),
    ("CSMSG_SET_MODES", "$bModes       $b %s"),
    ("CSMSG_SET_NODELETE", "$bNoDelete    $b %s"),
    ("CSMSG_SET_DYNLIMIT", "$bDynLimit    $b %s"),
    ("CSMSG_SET_OFFCHANNEL", "$bOffChannel  $b %s"),
    ("CSMSG_SET_UNREVIEWED", "$bUnreviewed  $b %s"),
    ("CSMSG_SET_GIVE_VOICE", "$bGiveVoice   $b %d"),
    ("CSMSG_SET_GIVE_OPS", "$bGiveOps     $b %d"),
    ("CSMSG_SET_ENFOPS", "$bEnfOps      $b %d"),
    ("CSMSG_SET_ENFMODES", "$bEnfModes    $b %d"),
    ("CSMSG_SET_ENFTOPIC", "$bEnfTopic    $b %d"),
    ("CSMSG_SET_PUBCMD", "$bPubCmd      $b %d"),
    ("CSMSG_SET_SETTERS", "$bSetters     $b %d"),
    ("CSMSG_SET_CTCPUSERS", "$bCTCPUsers   $b %d"),
    ("CSMSG_SET_USERINFO", "$bUserInfo    $b %d"),
    ("CSMSG_SET_INVITEME", "$bInviteMe    $b %d"),
    ("CSMSG_SET_TOPICSNARF", "$bTopicSnarf  $b %d"),
    ("CSMSG_SET_PROTECT", "$bProtect     $b %d - %s"),
    ("CSMSG_SET_TOYS", "$bToys        $b %d - %s"),
    ("CSMSG_SET_TOPICREFRESH", "$bTopicRefresh$b %d - %s"),
    ("CSMSG_SET_CTCPREACTION", "$bCTCPReaction$b %d - %s"),
    // Protection
    ("CSMSG_USER_PROTECTED", "Sorry, $b%s$b is protected."),
    ("CSMSG_OPBY_LOCKED", "You may not op users who lack op or greater access."),
    ("CSMSG_OPPED_USERS", "Opped users in $b%s$b."),
    ("CSMSG_DEOPPED_USERS", "Deopped users in $b%s$b."),
    ("CSMSG_VOICED_USERS", "Voiced users in $b%s$b."),
    ("CSMSG_DEVOICED_USERS", "Devoiced users in $b%s$b."),
    ("CSMSG_ALREADY_PRESENT", "%s is already in $b%s$b."),
    ("CSMSG_YOU_ALREADY_PRESENT", "You are already in $b%s$b."),
    ("CSMSG_LOW_CHANNEL_ACCESS", "You lack sufficient access in %s for $C to invite you."),
    ("CSMSG_PROTECT_ALL", "Non-users and users will be protected from those of equal or lower access."),
    ("CSMSG_PROTECT_EQUAL", "Users will be protected from those of equal or lower access."),
    ("CSMSG_PROTECT_LOWER", "Users will be protected from those of lower access."),
    ("CSMSG_PROTECT_NONE", "No users will be protected."),
    ("CSMSG_TOYS_DISABLED", "Toys are completely disabled."),
    ("CSMSG_TOYS_PRIVATE", "Toys will only reply privately."),
    ("CSMSG_TOYS_PUBLIC", "Toys will reply publicly."),
    ("CSMSG_TOPICREFRESH_NEVER", "Never refresh topic."),
    ("CSMSG_TOPICREFRESH_3_HOURS", "Refresh every 3 hours."),
    ("CSMSG_TOPICREFRESH_6_HOURS", "Refresh every 6 hours."),
    ("CSMSG_TOPICREFRESH_12_HOURS", "Refresh every 12 hours."),
    ("CSMSG_TOPICREFRESH_24_HOURS", "Refresh every 24 hours."),
    ("CSMSG_CTCPREACTION_KICK", "Kick on disallowed CTCPs"),
    ("CSMSG_CTCPREACTION_KICKBAN", "Kickban on disallowed CTCPs"),
    ("CSMSG_CTCPREACTION_SHORTBAN", "Short timed ban on disallowed CTCPs"),
    ("CSMSG_CTCPREACTION_LONGBAN", "Long timed ban on disallowed CTCPs"),
    // Suspension
    ("CSMSG_SUSPENDED", "$b$C$b access to $b%s$b has been temporarily suspended."),
    ("CSMSG_NOT_SUSPENDED", "$b%s$b is not suspended."),
    ("CSMSG_UNSUSPENDED", "$b$C$b access to $b%s$b has been restored."),
    ("CSMSG_SUSPEND_NODELETE", "$b%s$b is protected from suspension."),
    ("CSMSG_USER_SUSPENDED", "$b%s$b's access to $b%s$b has been suspended."),
    ("CSMSG_USER_UNSUSPENDED", "$b%s$b's access to $b%s$b has been restored."),
    // Notes
    ("CSMSG_NOTELIST_HEADER", "Notes for $b%s$b:"),
    ("CSMSG_REPLACED_NOTE", "Replaced old $b%s$b note on %s (set by %s): %s"),
    ("CSMSG_NOTE_FORMAT", "%s (set by %s): %s"),
    ("CSMSG_NOTELIST_END", "End of notes for $b%s$b."),
    ("CSMSG_NOTELIST_EMPTY", "There are no (visible) notes for $b%s$b."),
    ("CSMSG_NO_SUCH_NOTE", "Channel $b%s$b does not have a note named $b%s$b."),
    ("CSMSG_BAD_NOTE_TYPE", "Note type $b%s$b does not exist."),
    ("CSMSG_NOTE_SET", "Note $b%s$b set in channel $b%s$b."),
    ("CSMSG_NOTE_REMOVED", "Note $b%s$b removed in channel $b%s$b."),
    ("CSMSG_BAD_NOTE_ACCESS", "$b%s$b is not a valid note access type."),
    ("CSMSG_BAD_MAX_LENGTH", "$b%s$b is not a valid maximum length (must be between 20 and 450 inclusive)."),
    ("CSMSG_NOTE_MODIFIED", "Note type $b%s$b modified."),
    ("CSMSG_NOTE_CREATED", "Note type $b%s$b created."),
    ("CSMSG_NOTE_TYPE_USED", "Note type $b%s$b is in use; give the FORCE argument to delete it."),
    ("CSMSG_NOTE_DELETED", "Note type $b%s$b deleted."),
    // Info lines
    ("CSMSG_INFOLINE_TOO_LONG", "Your infoline may not exceed %u characters."),
    ("CSMSG_KICK_DONE", "Kicked $b%s$b from %s."),
    ("CSMSG_INVITED_USER", "Invited $b%s$b to join %s."),
    ("CSMSG_INVITING_YOU", "$b%s$b invites you to join %s."),
    ("CSMSG_CHANNELS_EXPIRED", "%i channels expired."),
    // Dispatch framework
    ("MSG_COMMAND_UNKNOWN", "$b%s$b is an unknown command."),
    ("MSG_NO_ACCESS", "You lack sufficient access to use this command."),
    ("MSG_INVALID_BINARY", "$b%s$b is an invalid binary value."),
    ("MSG_INVALID_DURATION", "Invalid duration %s."),
    ("MSG_MISSING_PARAMS", "$b%s$b requires more parameters."),
    ("MSG_AUTHENTICATE", "You must first authenticate with $b$N$b."),
    ("MSG_USER_AUTHENTICATE", "%s must first authenticate with $b$N$b."),
    ("MSG_COMMAND_PRIVILEGED", "$b%s$b is a privileged command."),
    ("MSG_COMMAND_DISABLED", "$b%s$b is a disabled command."),
    ("MSG_INVALID_CHANNEL", "You must provide a valid channel name."),
    ("MSG_TOPIC_UNKNOWN", "No help on that topic."),
    ("MSG_HANDLE_UNKNOWN", "Account $b%s$b has not been registered."),
    ("MSG_NICK_UNKNOWN", "User with nick $b%s$b does not exist."),
    ("MSG_OPER_SUSPENDED", "Your account has been suspended."),
    ("MSG_DB_UNKNOWN", "I do not know of a database named %s."),
    ("MSG_DB_IS_MONDO", "Database %s is a mondo section and cannot be written individually."),
    ("MSG_DB_WRITE_ERROR", "Error while writing database %s."),
    ("MSG_DB_WROTE_DB", "Wrote database %s."),
    ("MSG_DB_WROTE_ALL", "Wrote all databases."),
    ("MCMSG_BAD_OPSERV_LEVEL", "Invalid $O access level %s."),
    ("MCMSG_BAD_CHANSERV_LEVEL", "Invalid $C access level %s."),
    ("MCMSG_BAD_OPTION", "Unknown option %s."),
    ("MCMSG_MUST_QUALIFY", "You $bMUST$b \"/msg %s@$s %s\" (not just /msg %s)."),
    ("MCMSG_ACCOUNT_SUSPENDED", "Your account has been suspended."),
    ("MCMSG_CHAN_NOT_REGISTERED", "%s has not been registered with $C."),
    ("MCMSG_CHAN_SUSPENDED", "$b$C$b access to $b%s$b has been temporarily suspended (%s)."),
    ("MCMSG_NO_CHANNEL_ACCESS", "You lack access to %s."),
    ("MCMSG_LOW_CHANNEL_ACCESS", "You lack sufficient access in %s to use this command."),
    ("MCMSG_REQUIRES_JOINABLE", "You must be in %s (or on its userlist) to use this command."),
    ("MCMSG_MUST_BE_HELPING", "You must have security override (helping mode) on to use this command."),
    ("MCMSG_MISSING_COMMAND", "You must specify a command as well as a channel."),
    ("MCMSG_NO_CHANNEL_BEFORE", "You may not give a channel name before this command."),
    ("MCMSG_NO_PLUS_CHANNEL", "You may not use a +channel with this command."),
    ("MCMSG_COMMAND_ALIASES", "%s is an alias for: %s"),
    ("MCMSG_ALIAS_ERROR", "Error in alias expansion for %s; check the error log for details."),
    ("MCMSG_INTERNAL_COMMAND", "$b%s$b is an internal command and cannot be called directly; please check command bindings."),
    ("MCMSG_UNKNOWN_MODULE", "Unknown module %s."),
    ("MCMSG_UNKNOWN_SERVICE", "Unknown service %s."),
    ("MCMSG_ALREADY_BOUND", "%s already has a command bound as %s."),
    ("MCMSG_UNKNOWN_COMMAND_2", "Unknown command name %s (relative to service %s)."),
    ("MCMSG_COMMAND_MODIFIED", "Option $b%s$b for $b%s$b has been set."),
    ("MCMSG_CANNOT_DOUBLE_ALIAS", "You cannot bind to a complex (argument-carrying) bind."),
    ("MCMSG_BAD_ALIAS_ARGUMENT", "Invalid alias argument $b%s$b."),
    ("MCMSG_COMMAND_BOUND", "New command %s bound to %s."),
    ("MCMSG_MODULE_BOUND", "Bound %d commands from %s to %s."),
    ("MCMSG_NO_COMMAND_BOUND", "%s has nothing bound as command %s."),
    ("MCMSG_UNBIND_PROHIBITED", "It wouldn't be very much fun to unbind the last %s command, now would it?"),
    ("MCMSG_COMMAND_UNBOUND", "Unbound command %s from %s."),
    ("MCMSG_NO_HELPFILE", "Module %s does not have a help file."),
    ("MCMSG_HELPFILE_ERROR", "Syntax error reading %s; help contents not changed."),
    ("MCMSG_HELPFILE_READ", "Read %s help database in %d.%03d seconds."),
    ("MCMSG_COMMAND_TIME", "Command $b%s$b finished in %d.%06d seconds."),
    ("MCMSG_ALREADY_HELPING", "You already have security override enabled."),
    ("MCMSG_ALREADY_NOT_HELPING", "You already have security override disabled."),
    ("MCMSG_NOW_HELPING", "Security override has been enabled."),
    ("MCMSG_NOW_NOT_HELPING", "Security override has been disabled."),
    ("MCMSG_JOINER_CHOICES", "Subcommands of %s: %s"),
    ("MCMSG_MODULE_INFO", "Commands exported by module $b%s$b:"),
    ("MCMSG_SERVICE_INFO", "Commands bound to service $b%s$b:"),
    ("MCMSG_TOYS_DISABLED", "Toys are disabled in %s."),
    ("MCMSG_PUBLIC_DENY", "Public commands in $b%s$b are restricted."),
    ("MCMSG_BAD_SERVICE_NICK", "$b%s$b is an invalid nickname."),
    ("MCMSG_ALREADY_SERVICE", "$b%s$b is already a service."),
    ("MCMSG_NEW_SERVICE", "Added new service bot $b%s$b."),
    ("MCMSG_SERVICE_RENAMED", "Service renamed to $b%s$b."),
    ("MCMSG_NO_TRIGGER", "$b%s$b does not have an in-channel trigger."),
    ("MCMSG_REMOVED_TRIGGER", "Removed trigger from $b%s$b."),
    ("MCMSG_CURRENT_TRIGGER", "Trigger for $b%s$b is $b%c$b."),
    ("MCMSG_NEW_TRIGGER", "Changed trigger for $b%s$b to $b%c$b."),
    ("MCMSG_SERVICE_REMOVED", "Service $b%s$b has been deleted."),
    ("MCMSG_SERVICE_PRIVILEGED", "Service $b%s$b marked as %s."),
    ("MCMSG_VERSION", "$bsrvx-ng$b %s."),
    ("MCMSG_COMMAND_BINDING", "%s is a binding of: %s"),
    ("MCMSG_COMMAND_FLAGS", "Flags: %s"),
    ("MCMSG_NEED_OPSERV_LEVEL", "You must have $O access of at least $b%u$b."),
    ("MCMSG_NEED_CHANSERV_LEVEL", "You must have $C access of at least $b%u$b in the channel."),
    ("MCMSG_END_REQUIREMENTS", "End of requirements for $b%s$b."),
    ("MCMSG_INSPECTION_REFUSED", "You do not have access to inspect command %s."),
    ("MCMSG_COMMAND_ROW", "  %s"),
    ("MCMSG_HELP_COMMAND_HEADER", "$b%s$b"),
    ("MCMSG_HELP_LINE", "%s"),
    ("MCMSG_MODULE_ROW", "  %s (%d commands)"),
    ("MCMSG_SERVICE_ROW", "  %s (%s, %d bindings)"),
    ("MCMSG_DB_ROW", "  %s file=%s interval=%d %s"),
    ("MCMSG_MODULE_STATS", "%d modules loaded:"),
    ("MCMSG_SERVICE_STATS", "%d services registered:"),
    ("MCMSG_DB_STATS", "%d databases registered:"),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> BotNames {
        BotNames {
            chanserv: "X".into(),
            opserv: "O".into(),
            nickserv: "AuthServ".into(),
        }
    }

    #[test]
    fn expands_printf_and_dollar_codes() {
        let out = expand("$b%s$b has $d", &[&"#chan"], &names());
        assert_eq!(out, "\x02#chan\x02 has $d");

        let out = expand("ask $N about %s and %d%%", &[&"x", &42], &names());
        assert_eq!(out, "ask AuthServ about x and 42%");
    }

    #[test]
    fn renders_catalog_entries() {
        let out = render("CSMSG_NOT_REGISTERED", &[&"#foo"], &names());
        assert_eq!(out, "\x02#foo\x02 has not been registered with \x02X\x02.");
    }

    #[test]
    fn unknown_keys_surface_themselves() {
        assert_eq!(text_for("CSMSG_DOES_NOT_EXIST"), "CSMSG_DOES_NOT_EXIST");
    }
}
